use crate::geom::{EdgeList, Point3, PointList, StipplePattern, StippleStyle, Vec3, stipple_edges, stipple_line};

fn run(pattern: StipplePattern, scale: f64, len: f64) -> (EdgeList, PointList) {
    let mut edges = EdgeList::new();
    let mut points = PointList::new();
    let style = StippleStyle::new(pattern, scale).with_view_normal(Vec3::Z);
    stipple_line(Point3::ORIGIN, Point3::new(len, 0.0, 0.0), &style, &mut edges, &mut points);
    (edges, points)
}

#[test]
fn continuous_is_one_edge() {
    let (edges, points) = run(StipplePattern::Continuous, 1.0, 10.0);
    assert_eq!(edges.len(), 1);
    assert!(points.is_empty());
    assert!((edges.total_length() - 10.0).abs() < 1e-12);
}

#[test]
fn dash_covers_half_the_line() {
    let (edges, points) = run(StipplePattern::Dash, 1.0, 10.0);
    assert!(points.is_empty());
    assert_eq!(edges.len(), 5);
    assert!((edges.total_length() - 5.0).abs() < 1e-9);

    // Laid out from the far end.
    let first = edges.edges[0];
    assert!((first.a.x - 9.75).abs() < 1e-12);
    assert!((first.b.x - 8.75).abs() < 1e-12);
}

#[test]
fn long_dash_and_short_dash_ratios() {
    let (long, _) = run(StipplePattern::LongDash, 1.0, 30.0);
    // "_ ": two units on, half a unit off.
    assert!((long.total_length() / 30.0 - 0.8).abs() < 0.05);

    let (short, _) = run(StipplePattern::ShortDash, 1.0, 30.0);
    // "-  ": one unit on, one and a half off.
    assert!((short.total_length() / 30.0 - 0.4).abs() < 0.05);
}

#[test]
fn dots_emit_points_inside_the_line() {
    let (edges, points) = run(StipplePattern::Dot, 1.0, 5.0);
    assert!(edges.is_empty());
    assert_eq!(points.len(), 10);
    assert!(points.points.iter().all(|p| p.x > 0.0 && p.x < 5.0));

    let (edges, points) = run(StipplePattern::DashDotDot, 2.0, 20.0);
    assert!(!edges.is_empty());
    assert_eq!(points.len(), 2 * edges.len());
}

#[test]
fn zigzag_stays_within_width_and_connects() {
    let mut edges = EdgeList::new();
    let mut points = PointList::new();
    let style = StippleStyle::new(StipplePattern::Freehand, 1.0)
        .with_width(0.1)
        .with_view_normal(Vec3::Z);
    stipple_line(Point3::ORIGIN, Point3::new(4.0, 0.0, 0.0), &style, &mut edges, &mut points);

    assert!(!edges.is_empty());
    for e in &edges.edges {
        assert!(e.a.y.abs() <= 0.2 + 1e-12 && e.b.y.abs() <= 0.2 + 1e-12);
        assert!(e.a.z.abs() < 1e-12);
    }
    for w in edges.edges.windows(2) {
        assert!(w[0].b.distance_to(w[1].a) < 1e-12);
    }
    let last = edges.edges[edges.len() - 1];
    assert!(last.b.x.abs() < 1e-12);
}

#[test]
#[should_panic(expected = "view normal")]
fn zigzag_without_view_normal_panics() {
    let mut edges = EdgeList::new();
    let mut points = PointList::new();
    let style = StippleStyle::new(StipplePattern::Zigzag, 1.0);
    stipple_line(Point3::ORIGIN, Point3::new(1.0, 0.0, 0.0), &style, &mut edges, &mut points);
}

#[test]
fn stipple_edges_applies_to_every_edge() {
    let mut input = EdgeList::new();
    input.add_polyline(&[
        Point3::ORIGIN,
        Point3::new(10.0, 0.0, 0.0),
        Point3::new(10.0, 10.0, 0.0),
    ]);
    let mut edges = EdgeList::new();
    let mut points = PointList::new();
    stipple_edges(&input, &StippleStyle::new(StipplePattern::Dash, 1.0), &mut edges, &mut points);
    assert_eq!(edges.len(), 10);
    assert!((edges.total_length() - 10.0).abs() < 1e-9);
}
