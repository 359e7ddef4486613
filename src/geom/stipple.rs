//! Dashed flattening of lines into edges and points.

use serde::{Deserialize, Serialize};

use super::core::{Point3, Vec3};
use super::edges::{EdgeList, PointList};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StipplePattern {
    #[default]
    Continuous,
    ShortDash,
    Dash,
    LongDash,
    DashDot,
    DashDotDot,
    Dot,
    Freehand,
    Zigzag,
}

impl StipplePattern {
    /// Repeating element sequence. `' '` is a gap, `'-'` a dash, `'_'` a long dash,
    /// `'.'` a dot and `'~'` one zigzag period.
    #[must_use]
    pub const fn elements(self) -> &'static str {
        match self {
            Self::Continuous => "",
            Self::ShortDash => "-  ",
            Self::Dash => "- ",
            Self::LongDash => "_ ",
            Self::DashDot => "-.",
            Self::DashDotDot => "-..",
            Self::Dot => ".",
            Self::Freehand => "~",
            Self::Zigzag => "~__",
        }
    }

    #[must_use]
    pub const fn needs_view_normal(self) -> bool {
        matches!(self, Self::Freehand | Self::Zigzag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StippleStyle {
    pub pattern: StipplePattern,
    /// Length of one pattern unit; elements step in multiples of `scale / 2`.
    pub scale: f64,
    /// Zigzag amplitude is twice this.
    pub width: f64,
    /// Direction the line is viewed along. Zigzags are offset across the line in
    /// the plane perpendicular to it.
    pub view_normal: Option<Vec3>,
}

impl Default for StippleStyle {
    fn default() -> Self {
        Self {
            pattern: StipplePattern::Continuous,
            scale: 1.0,
            width: 0.05,
            view_normal: None,
        }
    }
}

impl StippleStyle {
    #[must_use]
    pub fn new(pattern: StipplePattern, scale: f64) -> Self {
        Self {
            pattern,
            scale,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_view_normal(mut self, n: Vec3) -> Self {
        self.view_normal = Some(n);
        self
    }

    #[must_use]
    pub fn with_width(mut self, width: f64) -> Self {
        self.width = width;
        self
    }
}

/// Flatten the line `a`-`b` into `edges` and `points` following `style`.
///
/// The pattern is laid out starting at `b` and walking toward `a`; the last element
/// is clipped at `a`.
///
/// # Panics
/// Panics when a freehand or zigzag pattern has no view normal.
pub fn stipple_line(a: Point3, b: Point3, style: &StippleStyle, edges: &mut EdgeList, points: &mut PointList) {
    let seq = style.pattern.elements().as_bytes();
    let ab = b - a;
    let len = ab.length();
    let (Some(dir), false) = (ab.normalized(), seq.is_empty()) else {
        edges.add_edge(a, b);
        return;
    };
    let ss = style.scale / 2.0;
    if !ss.is_finite() || ss <= 0.0 {
        edges.add_edge(a, b);
        return;
    }

    let across = if style.pattern.needs_view_normal() {
        let Some(gn) = style.view_normal.and_then(Vec3::normalized) else {
            panic!("{:?} stipple needs a view normal", style.pattern);
        };
        let abn = ab.cross(gn).normalized().unwrap_or(Vec3::ZERO);
        abn - gn * gn.dot(abn)
    } else {
        Vec3::ZERO
    };
    let pws = 2.0 * style.width;
    let at = |t: f64| a + dir * t;

    let mut end = len;
    let mut si = 0;
    loop {
        let mut start = end;
        match seq[si] {
            b' ' => end -= ss,
            b'-' => {
                start = (start - 0.5 * ss).max(0.0);
                end = (start - 2.0 * ss).max(0.0);
                if start > end {
                    edges.add_edge(at(start), at(end));
                    end = (end - 0.5 * ss).max(0.0);
                }
            }
            b'_' => {
                end = (end - 4.0 * ss).max(0.0);
                edges.add_edge(at(start), at(end));
            }
            b'.' => {
                end = (end - 0.5 * ss).max(0.0);
                if end > 0.0 {
                    points.add_point(at(end));
                    end = (end - 0.5 * ss).max(0.0);
                }
            }
            b'~' => {
                // Rise to +pws over half a unit, cross to -pws over one, return over half.
                end = (end - 0.5 * ss).max(0.0);
                let p0 = at(start);
                let p1 = at(end) + across * (pws * (start - end) / (0.5 * ss));
                edges.add_edge(p0, p1);
                if end > 0.0 {
                    start = end;
                    end = (end - ss).max(0.0);
                    let p2 = at(end) + across * pws - across * (2.0 * pws * (start - end) / ss);
                    edges.add_edge(p1, p2);
                    if end > 0.0 {
                        start = end;
                        end = (end - 0.5 * ss).max(0.0);
                        let p3 = at(end) - across * pws + across * (pws * (start - end) / (0.5 * ss));
                        edges.add_edge(p2, p3);
                    }
                }
            }
            other => panic!("unexpected stipple element {:?}", char::from(other)),
        }
        si = (si + 1) % seq.len();
        if end <= 0.0 {
            break;
        }
    }
}

/// Stipple every edge of `input`.
///
/// # Panics
/// See [`stipple_line`].
pub fn stipple_edges(input: &EdgeList, style: &StippleStyle, edges: &mut EdgeList, points: &mut PointList) {
    for e in &input.edges {
        stipple_line(e.a, e.b, style, edges, points);
    }
}
