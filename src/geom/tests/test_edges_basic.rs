use crate::geom::{Edge, EdgeList, Point3, PointList, Tolerance};

#[test]
fn polyline_edges_and_length() {
    let mut el = EdgeList::new();
    el.add_polyline(&[
        Point3::ORIGIN,
        Point3::new(3.0, 0.0, 0.0),
        Point3::new(3.0, 4.0, 0.0),
    ]);
    assert_eq!(el.len(), 2);
    assert!((el.total_length() - 7.0).abs() < 1e-12);

    el.clear();
    assert!(el.is_empty());
}

#[test]
fn distinct_ignores_direction() {
    let a = Point3::ORIGIN;
    let b = Point3::new(1.0, 0.0, 0.0);
    let c = Point3::new(1.0, 1.0, 0.0);

    let mut el = EdgeList::new();
    el.add_edge(a, b);
    el.add_edge(b, a);
    el.add_edge(b, c);
    el.add_edge(Point3::new(1.0, 1e-9, 0.0), c);

    let distinct = el.distinct(Tolerance::LENGTH);
    assert_eq!(distinct.len(), 2);
    assert_eq!(distinct.edges[0], Edge::new(a, b));
    assert!(Edge::new(a, b).is_same_as(&Edge::new(b, a).reversed().reversed(), Tolerance::LENGTH));
}

#[test]
fn points_are_unique_end_points() {
    let mut el = EdgeList::new();
    el.add_polyline(&[
        Point3::ORIGIN,
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
        Point3::ORIGIN,
    ]);
    let pts = el.points(Tolerance::LENGTH);
    assert_eq!(pts.len(), 3);

    let mut pl = PointList::new();
    pl.add_point(Point3::ORIGIN);
    pl.add_point(Point3::ORIGIN);
    assert_eq!(pl.len(), 2);
    pl.add_unique(Point3::new(0.0, 0.0, 1e-9), Tolerance::LENGTH);
    assert_eq!(pl.len(), 2);
}

#[test]
fn edge_display_is_readable() {
    let e = Edge::new(Point3::ORIGIN, Point3::new(1.0, 2.0, 3.0));
    assert_eq!(
        e.to_string(),
        "(0.000000, 0.000000, 0.000000) -> (1.000000, 2.000000, 3.000000)"
    );
}
