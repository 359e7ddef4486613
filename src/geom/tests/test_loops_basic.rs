use crate::geom::{BezierCurve, BezierList, BezierLoop, BezierLoopSet, LoopError, Point3, Tolerance};

fn square(x0: f64, y0: f64, size: f64) -> [Point3; 4] {
    [
        Point3::new(x0, y0, 0.0),
        Point3::new(x0 + size, y0, 0.0),
        Point3::new(x0 + size, y0 + size, 0.0),
        Point3::new(x0, y0 + size, 0.0),
    ]
}

#[test]
fn loop_assembly_flips_curves_as_needed() {
    let p = square(0.0, 0.0, 1.0);
    // Shuffled, and two curves given against the chain direction.
    let mut list: BezierList = [
        BezierCurve::line(p[2], p[3]),
        BezierCurve::line(p[1], p[0]),
        BezierCurve::line(p[0], p[3]),
        BezierCurve::line(p[1], p[2]),
    ]
    .into_iter()
    .collect();

    let lp = BezierLoop::from_curves(&mut list, Tolerance::LENGTH).unwrap();
    assert!(list.is_empty());
    assert_eq!(lp.l.len(), 4);
    assert!(lp.is_closed(Tolerance::LENGTH));
    for w in lp.l.windows(2) {
        assert!(Tolerance::LENGTH.approx_eq_point3(w[0].finish(), w[1].start()));
    }
}

#[test]
fn open_chain_reports_dangling_edge() {
    let p = square(0.0, 0.0, 1.0);
    let mut list: BezierList = [BezierCurve::line(p[0], p[1]), BezierCurve::line(p[1], p[2])]
        .into_iter()
        .collect();

    let err = BezierLoop::from_curves(&mut list, Tolerance::LENGTH).unwrap_err();
    let LoopError::NotClosed { at } = err else {
        panic!("expected NotClosed, got {err:?}");
    };
    assert_eq!(at.a, p[2]);
    assert_eq!(at.b, p[0]);
}

#[test]
fn empty_list_is_an_error() {
    assert_eq!(
        BezierLoopSet::from_curves(BezierList::new(), Tolerance::LENGTH).unwrap_err(),
        LoopError::Empty
    );
}

#[test]
fn loop_set_orients_outer_and_holes() {
    // Outer clockwise about +z, holes counter-clockwise.
    let mut outer = square(0.0, 0.0, 4.0);
    outer.reverse();
    let mut list = BezierList::from_polygon(&outer);
    list.extend(BezierList::from_polygon(&square(1.0, 1.0, 1.0)).l);
    list.extend(BezierList::from_polygon(&square(2.5, 2.5, 1.0)).l);

    let (sbls, polygon) = BezierLoopSet::from_curves(list, Tolerance::LENGTH).unwrap();
    assert_eq!(sbls.len(), 3);
    assert_eq!(polygon.contours.len(), 3);

    // Holes wind against the normal: net area 16 - 1 - 1.
    assert!((polygon.signed_area() - 14.0).abs() < 1e-9);
    for c in &polygon.contours[1..] {
        assert!(c.newell_normal().dot(polygon.normal) < 0.0);
    }
    assert_eq!(sbls.iter_curves().count(), 12);
}

#[test]
fn tilted_plane_normal() {
    let pts = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 1.0),
        Point3::new(1.0, 1.0, 1.0),
        Point3::new(0.0, 1.0, 0.0),
    ];
    let (sbls, _) = BezierLoopSet::from_curves(BezierList::from_polygon(&pts), Tolerance::LENGTH).unwrap();
    let h = std::f64::consts::FRAC_1_SQRT_2;
    assert!((sbls.normal.x + h).abs() < 1e-9);
    assert!(sbls.normal.y.abs() < 1e-9);
    assert!((sbls.normal.z - h).abs() < 1e-9);
}

#[test]
fn non_planar_loops_are_rejected() {
    let pts = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(1.0, 1.0, 0.3),
        Point3::new(0.0, 1.0, 0.0),
    ];
    let err = BezierLoopSet::from_curves(BezierList::from_polygon(&pts), Tolerance::LENGTH).unwrap_err();
    assert!(matches!(err, LoopError::NotPlanar { .. }), "{err:?}");
}

#[test]
fn curved_loop_keeps_its_curves() {
    let a = Point3::new(0.0, 0.0, 0.0);
    let b = Point3::new(2.0, 0.0, 0.0);
    let list: BezierList = [
        BezierCurve::cubic(a, Point3::new(0.5, -1.0, 0.0), Point3::new(1.5, -1.0, 0.0), b),
        BezierCurve::quadratic(b, Point3::new(1.0, 2.0, 0.0), a),
    ]
    .into_iter()
    .collect();
    let (sbls, polygon) = BezierLoopSet::from_curves(list, Tolerance::LENGTH).unwrap();
    assert_eq!(sbls.len(), 1);
    assert_eq!(sbls.l[0].l.len(), 2);
    assert!(polygon.contours[0].len() > 4);
    assert!(polygon.signed_area() > 0.0);
}
