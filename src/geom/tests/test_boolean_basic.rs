use super::{box_shell, mesh_of, unit_cube};
use crate::geom::{
    BezierCurve, BezierList, BezierLoopSet, BooleanError, BooleanOp, CurveSource, GeomContext, Point3,
    PointContainment, Quaternion, Rgba, Shell, Tolerance, Triangle3, TriTriIntersection, Vec3,
    classify_point_in_shell, triangle_triangle_intersection,
};

fn offset_box() -> Shell {
    box_shell(Point3::new(0.5, 0.25, 0.25), Point3::new(1.5, 0.75, 0.75))
}

fn assert_volume(shell: &Shell, expected: f64) {
    assert_volume_within(shell, expected, 1e-6);
}

fn assert_volume_within(shell: &Shell, expected: f64, within: f64) {
    let mesh = mesh_of(shell);
    let volume = mesh.signed_volume();
    assert!(
        (volume - expected).abs() < within,
        "volume {volume}, expected {expected}"
    );
}

/// Vertical cylinder over `center` from four rational quarter arcs. The arc
/// joints sit at `center ± r` along x and y.
fn cylinder(center: Point3, r: f64, z0: f64, z1: f64) -> Shell {
    let w = std::f64::consts::FRAC_1_SQRT_2;
    let at = |x: f64, y: f64| Point3::new(center.x + x * r, center.y + y * r, 0.0);
    let quarter = |p0: Point3, p1: Point3, p2: Point3| BezierCurve::rational(2, [p0, p1, p2, p2], [1.0, w, 1.0, 1.0]);
    let arcs: BezierList = [
        quarter(at(1.0, 0.0), at(1.0, 1.0), at(0.0, 1.0)),
        quarter(at(0.0, 1.0), at(-1.0, 1.0), at(-1.0, 0.0)),
        quarter(at(-1.0, 0.0), at(-1.0, -1.0), at(0.0, -1.0)),
        quarter(at(0.0, -1.0), at(1.0, -1.0), at(1.0, 0.0)),
    ]
    .into_iter()
    .collect();
    let (sbls, _) = BezierLoopSet::from_curves(arcs, Tolerance::LENGTH).expect("circle loop set");
    Shell::from_extrusion_of(&sbls, Vec3::new(0.0, 0.0, z0), Vec3::new(0.0, 0.0, z1), Rgba::WHITE)
}

fn assert_watertight(shell: &Shell) {
    let diag = mesh_of(shell).diagnostics(Tolerance::LENGTH);
    assert!(diag.is_watertight(), "open edges: {}", diag.summary());
    assert!(diag.is_manifold(), "non-manifold edges: {}", diag.summary());
}

#[test]
fn triangle_intersection_crossing_yields_segment() {
    let tol = Tolerance::new(1e-9);
    let a = Triangle3::new(
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(2.0, 0.0, 0.0),
        Point3::new(0.0, 2.0, 0.0),
    );
    let b = Triangle3::new(
        Point3::new(0.5, 0.5, -1.0),
        Point3::new(0.5, 0.5, 1.0),
        Point3::new(-1.0, 0.5, 0.0),
    );
    let Some(TriTriIntersection::Segment(seg)) = triangle_triangle_intersection(a, b, tol) else {
        panic!("expected a segment");
    };
    for p in [seg.a, seg.b] {
        assert!(p.z.abs() < 1e-9);
        assert!((p.y - 0.5).abs() < 1e-9);
    }
    assert!((seg.a.x - seg.b.x).abs() > 0.4);
}

#[test]
fn triangle_intersection_reports_coplanar_and_disjoint() {
    let tol = Tolerance::new(1e-9);
    let a = Triangle3::new(
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
    );
    let b = Triangle3::new(
        Point3::new(0.2, 0.2, 0.0),
        Point3::new(1.2, 0.2, 0.0),
        Point3::new(0.2, 1.2, 0.0),
    );
    assert_eq!(triangle_triangle_intersection(a, b, tol), Some(TriTriIntersection::Coplanar));

    let far = Triangle3::new(
        Point3::new(0.0, 0.0, 5.0),
        Point3::new(1.0, 0.0, 5.0),
        Point3::new(0.0, 1.0, 5.0),
    );
    assert_eq!(triangle_triangle_intersection(a, far, tol), None);
}

#[test]
fn point_classification_against_cube() {
    let cube = unit_cube();
    let ctx = GeomContext::default();
    let at = |x, y, z| classify_point_in_shell(Point3::new(x, y, z), &cube, &ctx).unwrap();

    assert_eq!(at(0.5, 0.5, 0.5), PointContainment::Inside);
    assert_eq!(at(0.37, 0.61, 0.13), PointContainment::Inside);
    assert_eq!(at(1.5, 0.5, 0.5), PointContainment::Outside);
    assert_eq!(at(0.5, 0.5, -0.2), PointContainment::Outside);
    assert_eq!(at(0.5, 0.5, 1.0), PointContainment::OnSurface);
}

#[test]
fn union_of_overlapping_boxes() {
    let a = unit_cube();
    let b = offset_box();
    let (out, diag) = Shell::union(&a, &b).unwrap();

    assert_eq!(diag.op, BooleanOp::Union);
    assert_eq!(diag.intersection_curve_count, 4);
    assert_eq!(diag.same_fate_cuts_skipped, 0);
    assert_eq!(diag.surfaces_removed, 1);
    assert_eq!(out.surfaces.len(), 11);
    assert!(out.curves.iter().any(|c| c.source == CurveSource::Intersection));

    assert_volume(&out, 1.125);
    assert_watertight(&out);

    // Operands are untouched.
    assert_eq!(a.surfaces.len(), 6);
    assert_eq!(b.surfaces.len(), 6);
}

#[test]
fn difference_of_overlapping_boxes() {
    let a = unit_cube();
    let b = offset_box();
    let (out, diag) = Shell::difference(&a, &b).unwrap();

    assert_eq!(diag.op, BooleanOp::Difference);
    assert_volume(&out, 0.875);
    assert_watertight(&out);
}

#[test]
fn self_union_and_self_difference() {
    let a = unit_cube();
    let b = unit_cube();

    let (union, diag) = Shell::union(&a, &b).unwrap();
    assert!(diag.coplanar_pair_count > 0);
    assert_eq!(union.surfaces.len(), 6);
    assert_volume(&union, 1.0);

    let (difference, _) = Shell::difference(&a, &b).unwrap();
    assert!(difference.is_empty());
}

#[test]
fn union_of_disjoint_boxes_keeps_both() {
    let a = unit_cube();
    let b = box_shell(Point3::new(3.0, 0.0, 0.0), Point3::new(4.0, 1.0, 1.0));
    let (out, diag) = Shell::union(&a, &b).unwrap();

    assert_eq!(diag.intersection_curve_count, 0);
    assert_eq!(out.surfaces.len(), 12);
    assert_volume(&out, 2.0);
}

#[test]
fn union_of_boxes_sharing_a_face_drops_the_shared_faces() {
    let a = unit_cube();
    let b = box_shell(Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
    let (out, _) = Shell::union(&a, &b).unwrap();

    assert_eq!(out.surfaces.len(), 10);
    assert_volume(&out, 2.0);
    assert_watertight(&out);

    let (diff, _) = Shell::difference(&a, &b).unwrap();
    assert_eq!(diff.surfaces.len(), 6);
    assert_volume(&diff, 1.0);
}

#[test]
fn difference_with_enclosed_box_leaves_a_cavity() {
    let a = unit_cube();
    let b = box_shell(Point3::new(0.25, 0.25, 0.25), Point3::new(0.75, 0.75, 0.75));
    let (out, diag) = Shell::difference(&a, &b).unwrap();

    assert_eq!(diag.intersection_curve_count, 0);
    assert_eq!(out.surfaces.len(), 12);
    assert_volume(&out, 0.875);
}

#[test]
fn empty_operands() {
    let a = unit_cube();
    let empty = Shell::new();

    let (u, _) = Shell::union(&empty, &a).unwrap();
    assert_eq!(u.surfaces.len(), 6);
    assert_volume(&u, 1.0);

    let (d, _) = Shell::difference(&a, &empty).unwrap();
    assert_eq!(d.surfaces.len(), 6);

    let (d, _) = Shell::difference(&empty, &a).unwrap();
    assert!(d.is_empty());
}

#[test]
fn make_from_union_of_replaces_contents() {
    let a = unit_cube();
    let moved = {
        let mut s = Shell::new();
        s.make_from_transformation_of(&a, Vec3::new(0.5, 0.5, 0.5), crate::geom::Quaternion::IDENTITY);
        s
    };
    let mut out = Shell::from_plane(Point3::ORIGIN, Vec3::Z, crate::geom::Rgba::RED);
    let diag = out.make_from_union_of(&a, &moved).unwrap();

    assert!(diag.intersection_curve_count >= 6);
    assert_volume(&out, 2.0 - 0.125);
    assert_watertight(&out);
}

#[test]
fn union_with_partly_overlapping_coplanar_caps() {
    let a = unit_cube();
    let b = box_shell(Point3::new(0.5, 0.5, 0.0), Point3::new(1.5, 1.5, 1.0));
    let (out, diag) = Shell::union(&a, &b).unwrap();

    // Cuts inside the shared bottom and top planes bound nothing on the cube.
    assert!(diag.same_fate_cuts_skipped > 0);
    assert_volume(&out, 1.75);
    assert_watertight(&out);
}

#[test]
fn difference_with_partly_overlapping_coplanar_caps() {
    let a = unit_cube();
    let b = box_shell(Point3::new(0.5, 0.5, 0.0), Point3::new(1.5, 1.5, 1.0));
    let (out, diag) = Shell::difference(&a, &b).unwrap();

    assert!(diag.same_fate_cuts_skipped > 0);
    // Caps and two sides of the cube, two trimmed sides, two walls of the notch.
    assert_eq!(out.surfaces.len(), 8);
    assert_volume(&out, 0.75);
    assert_watertight(&out);
}

#[test]
fn coplanar_overlap_survives_a_rotation_about_the_shared_axis() {
    let a = unit_cube();
    let mut b = Shell::new();
    b.make_from_transformation_of(
        &box_shell(Point3::new(-0.5, -0.5, 0.0), Point3::new(0.5, 0.5, 1.0)),
        Vec3::new(1.0, 1.0, 0.0),
        Quaternion::from_axis_angle(Vec3::Z, 0.3),
    );
    let (out, _) = Shell::union(&a, &b).unwrap();
    assert_watertight(&out);

    let (out, _) = Shell::difference(&a, &b).unwrap();
    assert_watertight(&out);
}

#[test]
fn union_with_cylinder_whose_seams_lie_on_a_box_face() {
    let block = box_shell(Point3::ORIGIN, Point3::new(2.0, 2.0, 1.0));
    let post = cylinder(Point3::new(2.0, 1.0, 0.0), 0.5, 0.5, 1.5);
    let (out, diag) = Shell::union(&block, &post).unwrap();

    // Each seam line is shared by two arc surfaces of the post.
    assert!(diag.duplicate_cuts_skipped >= 2);
    assert_watertight(&out);

    let disc = std::f64::consts::PI * 0.25;
    assert_volume_within(&out, 4.0 + disc - 0.5 * disc * 0.5, 0.01);
}

#[test]
fn difference_with_cylinder_through_a_box() {
    let block = box_shell(Point3::ORIGIN, Point3::new(2.0, 2.0, 1.0));
    let drill = cylinder(Point3::new(1.0, 1.0, 0.0), 0.5, -1.0, 2.0);
    let (out, diag) = Shell::difference(&block, &drill).unwrap();

    assert_eq!(diag.intersection_curve_count, 8);
    assert_watertight(&out);
    assert_volume_within(&out, 4.0 - std::f64::consts::PI * 0.25, 0.01);
}

#[test]
fn open_trims_error_names_surface_and_edge() {
    let err = BooleanError::OpenTrims {
        operand: "B",
        surface: crate::geom::SurfaceHandle::default(),
        at: crate::geom::Edge::new(Point3::ORIGIN, Point3::new(0.0, 0.0, 1.0)),
    };
    let message = err.to_string();
    assert!(message.contains("shell B"), "{message}");
    assert!(message.contains("do not close"), "{message}");
}
