use crate::geom::{
    Tolerance, TriangulationError, TriangulationOptions, TriangulationResult, TrimLoop, TrimRegion,
    UvPoint, regions_from_loops, triangulate_trim_region, triangulate_trim_region_with_steiner_points,
};

fn uv_loop(points: &[(f64, f64)]) -> TrimLoop {
    TrimLoop::new(points.iter().map(|&(u, v)| UvPoint::new(u, v)).collect(), Tolerance::new(1e-9)).unwrap()
}

fn single_region(loops: Vec<TrimLoop>) -> TrimRegion {
    let (mut regions, _) = regions_from_loops(loops, Tolerance::new(1e-9)).unwrap();
    assert_eq!(regions.len(), 1);
    regions.remove(0)
}

fn total_area(result: &TriangulationResult) -> f64 {
    result
        .triangles()
        .map(|[a, b, c]| {
            let (pa, pb, pc) = (result.vertices[a], result.vertices[b], result.vertices[c]);
            0.5 * ((pb.u - pa.u) * (pc.v - pa.v) - (pc.u - pa.u) * (pb.v - pa.v))
        })
        .sum()
}

#[test]
fn square_is_two_ccw_triangles() {
    let region = single_region(vec![uv_loop(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)])]);
    let result = triangulate_trim_region(&region, Tolerance::new(1e-9)).unwrap();

    assert_eq!(result.boundary_count, 4);
    assert_eq!(result.indices.len(), 6);
    assert!((total_area(&result) - 1.0).abs() < 1e-12);
    for [a, b, c] in result.triangles() {
        let (pa, pb, pc) = (result.vertices[a], result.vertices[b], result.vertices[c]);
        let cross = (pb.u - pa.u) * (pc.v - pa.v) - (pc.u - pa.u) * (pb.v - pa.v);
        assert!(cross > 0.0);
    }
}

#[test]
fn clockwise_outer_is_normalized() {
    let region = single_region(vec![uv_loop(&[(0.0, 0.0), (0.0, 2.0), (2.0, 2.0), (2.0, 0.0)])]);
    assert!(region.outer.is_ccw());
    let result = triangulate_trim_region(&region, Tolerance::new(1e-9)).unwrap();
    assert!((total_area(&result) - 4.0).abs() < 1e-12);
}

#[test]
fn hole_area_is_excluded() {
    let region = single_region(vec![
        uv_loop(&[(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)]),
        uv_loop(&[(0.5, 0.5), (1.5, 0.5), (1.5, 1.5), (0.5, 1.5)]),
    ]);
    assert_eq!(region.holes.len(), 1);

    let result = triangulate_trim_region(&region, Tolerance::new(1e-9)).unwrap();
    assert_eq!(result.boundary_count, 8);
    assert!((total_area(&result) - 3.0).abs() < 1e-12);
    for [a, b, c] in result.triangles() {
        let u = (result.vertices[a].u + result.vertices[b].u + result.vertices[c].u) / 3.0;
        let v = (result.vertices[a].v + result.vertices[b].v + result.vertices[c].v) / 3.0;
        assert!(!(u > 0.5 && u < 1.5 && v > 0.5 && v < 1.5), "centroid ({u}, {v}) in hole");
    }
}

#[test]
fn concave_outline_triangulates_exactly() {
    // L shape.
    let region = single_region(vec![uv_loop(&[
        (0.0, 0.0),
        (2.0, 0.0),
        (2.0, 1.0),
        (1.0, 1.0),
        (1.0, 2.0),
        (0.0, 2.0),
    ])]);
    let result = triangulate_trim_region(&region, Tolerance::new(1e-9)).unwrap();
    assert_eq!(result.indices.len() / 3, 4);
    assert!((total_area(&result) - 3.0).abs() < 1e-12);
}

#[test]
fn steiner_points_inside_are_inserted_and_others_rejected() {
    let region = single_region(vec![uv_loop(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)])]);
    let steiner = [
        UvPoint::new(0.25, 0.25),
        UvPoint::new(0.75, 0.25),
        UvPoint::new(0.5, 0.75),
        UvPoint::new(1.5, 0.5),
        UvPoint::new(0.5, 0.01),
    ];
    let options = TriangulationOptions {
        steiner_clearance: 0.05,
        ..TriangulationOptions::default()
    };
    let result =
        triangulate_trim_region_with_steiner_points(&region, &steiner, Tolerance::new(1e-9), options).unwrap();

    assert_eq!(result.diagnostics.steiner_points_inserted, 3);
    assert_eq!(result.diagnostics.steiner_points_rejected, 2);
    assert_eq!(result.vertices.len(), 7);
    // Each interior point adds two triangles.
    assert_eq!(result.indices.len() / 3, 8);
    assert!((total_area(&result) - 1.0).abs() < 1e-12);

    // Boundary edges are never flipped away.
    let boundary_edges = [(0, 1), (1, 2), (2, 3), (3, 0)];
    for (a, b) in boundary_edges {
        let present = result
            .triangles()
            .any(|t| (0..3).any(|k| t[k] == a && t[(k + 1) % 3] == b));
        assert!(present, "boundary edge {a}-{b} missing");
    }
}

#[test]
fn degenerate_input_is_an_error() {
    let err = TrimLoop::new(
        vec![UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 0.0), UvPoint::new(0.0, 0.0)],
        Tolerance::new(1e-9),
    )
    .unwrap_err();
    assert!(matches!(err, crate::geom::TrimError::InsufficientPoints { .. }));

    let nan = TrimLoop::new(
        vec![UvPoint::new(0.0, 0.0), UvPoint::new(f64::NAN, 0.0), UvPoint::new(0.0, 1.0)],
        Tolerance::new(1e-9),
    );
    assert!(matches!(nan, Err(crate::geom::TrimError::NonFinitePoints)));
    assert_eq!(
        TriangulationError::NoEars { remaining: 5 }.to_string(),
        "failed to triangulate polygon (no ears found, 5 vertices left)"
    );
}
