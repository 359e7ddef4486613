mod bezier;
mod boolean;
mod bvh;
mod core;
mod curve;
mod diagnostics;
mod edges;
mod handle;
mod loops;
mod mesh;
mod shell;
mod stipple;
mod surface;
mod tessellation;
mod trim;
mod triangulation;

pub use bezier::{BezierCurve, BezierList, bernstein, bernstein_derivative};
pub use boolean::{
    BooleanDiagnostics, BooleanError, BooleanOp, PointContainment, Segment3, TriTriIntersection,
    Triangle3, classify_point_in_shell, triangle_triangle_intersection,
};
pub use core::{BBox, Point3, Quaternion, Tolerance, Vec3};
pub use curve::{CurveSource, ShellCurve, TrimBy};
pub use diagnostics::MeshDiagnostics;
pub use edges::{Edge, EdgeList, PointList};
pub use handle::{CurveHandle, Handle, HasHandle, IdList, SurfaceHandle};
pub use loops::{BezierLoop, BezierLoopSet, Contour, LoopError, Polygon};
pub use mesh::{Mesh, Rgba, Triangle};
pub use shell::{Shell, SurfaceMeshError};
pub use stipple::{StipplePattern, StippleStyle, stipple_edges, stipple_line};
pub use surface::{BezierSurface, ClosestPoint, NEWTON_ITERATIONS};
pub use tessellation::{
    CurveTessellationOptions, GeomContext, SurfaceTessellationOptions,
    choose_surface_grid_counts,
};
pub use trim::{
    TrimDiagnostics, TrimError, TrimLoop, TrimRegion, UvDomain, UvPoint, point_in_polygon,
    regions_from_loops, signed_area,
};
pub use triangulation::{
    TriangulationDiagnostics, TriangulationError, TriangulationOptions, TriangulationResult,
    triangulate_trim_region, triangulate_trim_region_with_steiner_points,
};

#[cfg(test)]
mod tests;
