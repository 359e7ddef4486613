mod test_boolean_basic;
mod test_edges_basic;
mod test_loops_basic;
mod test_stipple_basic;
mod test_triangulation_basic;

use crate::geom::{BezierList, BezierLoopSet, Mesh, Point3, Rgba, Shell, Tolerance, Vec3};

/// Axis-aligned box `[min, max]` extruded from its bottom rectangle.
pub(super) fn box_shell(min: Point3, max: Point3) -> Shell {
    let rect = [
        Point3::new(min.x, min.y, 0.0),
        Point3::new(max.x, min.y, 0.0),
        Point3::new(max.x, max.y, 0.0),
        Point3::new(min.x, max.y, 0.0),
    ];
    let (sbls, _) = BezierLoopSet::from_curves(BezierList::from_polygon(&rect), Tolerance::LENGTH)
        .expect("rectangle loop set");
    Shell::from_extrusion_of(&sbls, Vec3::new(0.0, 0.0, min.z), Vec3::new(0.0, 0.0, max.z), Rgba::WHITE)
}

pub(super) fn unit_cube() -> Shell {
    box_shell(Point3::ORIGIN, Point3::new(1.0, 1.0, 1.0))
}

pub(super) fn mesh_of(shell: &Shell) -> Mesh {
    let mut mesh = Mesh::new();
    let diag = shell.triangulate_into(&mut mesh);
    assert_eq!(diag.skipped_surfaces, 0, "surfaces skipped: {:?}", diag.warnings);
    mesh
}
