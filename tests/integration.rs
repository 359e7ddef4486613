use srf_kernel::geom::{
    BezierCurve, BezierList, BezierLoopSet, EdgeList, Point3, PointList, Quaternion, Rgba, StipplePattern,
    StippleStyle, Vec3, stipple_edges,
};
use srf_kernel::{Mesh, Shell, Tolerance};

fn prism(outline: &[Point3], z0: f64, z1: f64) -> Shell {
    let (sbls, _) = BezierLoopSet::from_curves(BezierList::from_polygon(outline), Tolerance::LENGTH)
        .expect("closed outline");
    Shell::from_extrusion_of(&sbls, Vec3::new(0.0, 0.0, z0), Vec3::new(0.0, 0.0, z1), Rgba::WHITE)
}

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> [Point3; 4] {
    [
        Point3::new(x0, y0, 0.0),
        Point3::new(x1, y0, 0.0),
        Point3::new(x1, y1, 0.0),
        Point3::new(x0, y1, 0.0),
    ]
}

fn mesh(shell: &Shell) -> Mesh {
    let mut mesh = Mesh::new();
    let diag = shell.triangulate_into(&mut mesh);
    assert_eq!(diag.skipped_surfaces, 0, "{:?}", diag.warnings);
    mesh
}

#[test]
fn l_profile_extrusion_is_a_closed_solid() {
    let outline = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(2.0, 0.0, 0.0),
        Point3::new(2.0, 1.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
        Point3::new(1.0, 2.0, 0.0),
        Point3::new(0.0, 2.0, 0.0),
    ];
    let shell = prism(&outline, 0.0, 1.0);
    assert_eq!(shell.surfaces.len(), 8);

    let m = mesh(&shell);
    assert!(m.diagnostics(Tolerance::LENGTH).is_valid_solid());
    assert!((m.signed_volume() - 3.0).abs() < 1e-9);
}

#[test]
fn drilled_block_loses_the_hole_volume() {
    let block = prism(&rect(0.0, 0.0, 2.0, 2.0), 0.0, 1.0);
    let drill = prism(&rect(0.5, 0.5, 1.0, 1.0), -1.0, 2.0);

    let (result, diag) = Shell::difference(&block, &drill).expect("difference");
    assert_eq!(diag.same_fate_cuts_skipped, 0);
    // Block sides and caps, plus the four walls of the hole.
    assert_eq!(result.surfaces.len(), 10);

    let m = mesh(&result);
    assert!(m.diagnostics(Tolerance::LENGTH).is_watertight());
    assert!((m.signed_volume() - 3.75).abs() < 1e-6);
}

#[test]
fn copies_moved_apart_union_into_two_lumps() {
    let cube = prism(&rect(0.0, 0.0, 1.0, 1.0), 0.0, 1.0);
    let mut moved = Shell::new();
    moved.make_from_transformation_of(
        &cube,
        Vec3::new(5.0, 0.0, 0.0),
        Quaternion::from_axis_angle(Vec3::Z, std::f64::consts::FRAC_PI_4),
    );
    let mut copy = Shell::new();
    copy.make_from_copy_of(&cube);

    let mut both = Shell::new();
    let diag = both.make_from_union_of(&copy, &moved).expect("union");
    assert_eq!(diag.intersection_curve_count, 0);
    assert_eq!(both.surfaces.len(), 12);

    let m = mesh(&both);
    assert!(m.diagnostics(Tolerance::LENGTH).is_valid_solid());
    assert!((m.signed_volume() - 2.0).abs() < 1e-9);
}

#[test]
fn rounded_profile_volume_converges() {
    // Half-disc of radius 1 closed by its diameter.
    let k = 4.0 / 3.0 * (std::f64::consts::SQRT_2 - 1.0);
    let arcs: BezierList = [
        BezierCurve::cubic(
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, k, 0.0),
            Point3::new(k, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ),
        BezierCurve::cubic(
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(-k, 1.0, 0.0),
            Point3::new(-1.0, k, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
        ),
        BezierCurve::line(Point3::new(-1.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)),
    ]
    .into_iter()
    .collect();
    let (sbls, _) = BezierLoopSet::from_curves(arcs, Tolerance::LENGTH).expect("half disc");
    let shell = Shell::from_extrusion_of(&sbls, Vec3::ZERO, Vec3::new(0.0, 0.0, 2.0), Rgba::WHITE);

    let m = mesh(&shell);
    assert!(m.diagnostics(Tolerance::LENGTH).is_watertight());
    assert!((m.signed_volume() - std::f64::consts::PI).abs() < 0.02);
}

#[test]
fn shell_edges_can_be_stippled() {
    let cube = prism(&rect(0.0, 0.0, 1.0, 1.0), 0.0, 1.0);
    let mut el = EdgeList::new();
    cube.make_edges_into(&mut el, false);
    let distinct = el.distinct(Tolerance::LENGTH);
    assert_eq!(distinct.len(), 12);

    let mut dashes = EdgeList::new();
    let mut dots = PointList::new();
    stipple_edges(&distinct, &StippleStyle::new(StipplePattern::Dash, 0.25), &mut dashes, &mut dots);
    assert!(dots.is_empty());
    assert!((dashes.total_length() - 6.0).abs() < 1e-6);
}
