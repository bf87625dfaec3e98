use serde::{Deserialize, Serialize};

use crate::Point2D;

pub fn distance(a: &Point2D, b: &Point2D) -> f32 {
    (a - b).norm()
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1. - t) + (b * t)
}

/// Where `value` lies between `a` and `b`, clamped to [0;1].
/// A zero-width range counts as fully reached once `value` passes it.
pub fn inverse_lerp(a: f32, b: f32, value: f32) -> f32 {
    if (b - a).abs() < f32::EPSILON {
        return if (b >= a && value >= b) || (b < a && value <= b) {
            1.
        } else {
            0.
        };
    }
    ((value - a) / (b - a)).clamp(0., 1.)
}

/// Normalise an angle (degrees) into the range (-180;180]
pub fn normalise_angle(degrees: f32) -> f32 {
    let wrapped = degrees % 360.;
    if wrapped > 180. {
        wrapped - 360.
    } else if wrapped <= -180. {
        wrapped + 360.
    } else {
        wrapped
    }
}

/// Maps a normalised input onto an output value. Used wherever a
/// progress or gesture metric needs easing before it is applied.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ResponseCurve {
    Linear,
    Squared,
    /// Piecewise-linear `[input, output]` keyframes, sorted by input.
    /// Inputs outside the keyframes take the value of the nearest end.
    Keyframes(Vec<[f32; 2]>),
}

impl ResponseCurve {
    pub fn evaluate(&self, input: f32) -> f32 {
        match self {
            ResponseCurve::Linear => input,
            ResponseCurve::Squared => input * input,
            ResponseCurve::Keyframes(keys) => {
                let (Some(first), Some(last)) = (keys.first(), keys.last()) else {
                    return input;
                };
                if input <= first[0] {
                    return first[1];
                }
                if input >= last[0] {
                    return last[1];
                }
                keys.windows(2)
                    .find(|w| input >= w[0][0] && input <= w[1][0])
                    .map(|w| {
                        let t = inverse_lerp(w[0][0], w[1][0], input);
                        lerp(w[0][1], w[1][1], t)
                    })
                    .unwrap_or(last[1])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_angle() {
        assert_eq!(normalise_angle(0.), 0.);
        assert_eq!(normalise_angle(180.), 180.);
        assert_eq!(normalise_angle(-180.), 180.);
        assert_eq!(normalise_angle(270.), -90.);
        assert_eq!(normalise_angle(-270.), 90.);
        assert_eq!(normalise_angle(540.), 180.);
        assert_eq!(normalise_angle(-90.), -90.);
    }

    #[test]
    fn test_inverse_lerp_clamps() {
        assert_eq!(inverse_lerp(0., 0.1, 0.05), 0.5);
        assert_eq!(inverse_lerp(0., 0.1, -1.), 0.);
        assert_eq!(inverse_lerp(0., 0.1, 1.), 1.);
        assert_eq!(inverse_lerp(0.1, 0., 0.), 1.);
    }

    #[test]
    fn test_inverse_lerp_zero_width() {
        assert_eq!(inverse_lerp(0., 0., 0.), 1.);
        assert_eq!(inverse_lerp(0., 0., -0.01), 0.);
    }

    #[test]
    fn test_keyframe_curve() {
        let curve = ResponseCurve::Keyframes(vec![[0.5, 1.0], [0.9, 0.0]]);
        assert_eq!(curve.evaluate(0.2), 1.0);
        assert_eq!(curve.evaluate(1.0), 0.0);
        assert!((curve.evaluate(0.7) - 0.5).abs() < 1e-5);

        assert_eq!(ResponseCurve::Squared.evaluate(0.5), 0.25);
        assert_eq!(ResponseCurve::Keyframes(vec![]).evaluate(0.3), 0.3);
    }
}
