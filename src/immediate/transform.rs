use kurbo::Affine;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    #[error("unknown transform function `{0}`")]
    UnknownFunction(String),
    #[error("`{name}` takes {expected} arguments, got {got}")]
    ArgumentCount {
        name: String,
        expected: &'static str,
        got: usize,
    },
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
    #[error("malformed transform list")]
    Syntax,
}

/// Parses an SVG transform list. Functions compose left to right, so the
/// rightmost one applies to points first.
pub fn parse_transform(input: &str) -> Result<Affine, TransformError> {
    let mut result = Affine::IDENTITY;
    let mut rest = input.trim();
    while !rest.is_empty() {
        let open = rest.find('(').ok_or(TransformError::Syntax)?;
        let close = rest.find(')').ok_or(TransformError::Syntax)?;
        if close < open {
            return Err(TransformError::Syntax);
        }
        let name = rest[..open].trim();
        let args = rest[open + 1..close]
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| TransformError::InvalidNumber(s.to_string()))
            })
            .collect::<Result<Vec<f64>, _>>()?;
        result = result * function(name, &args)?;
        rest = rest[close + 1..].trim_start_matches(|c: char| c == ',' || c.is_whitespace());
    }
    Ok(result)
}

fn function(name: &str, args: &[f64]) -> Result<Affine, TransformError> {
    let count = |expected: &'static str| TransformError::ArgumentCount {
        name: name.to_string(),
        expected,
        got: args.len(),
    };
    match name {
        "matrix" => match args {
            [a, b, c, d, e, f] => Ok(Affine::new([*a, *b, *c, *d, *e, *f])),
            _ => Err(count("6")),
        },
        "translate" => match args {
            [tx] => Ok(Affine::translate((*tx, 0.0))),
            [tx, ty] => Ok(Affine::translate((*tx, *ty))),
            _ => Err(count("1 or 2")),
        },
        "scale" => match args {
            [s] => Ok(Affine::scale(*s)),
            [sx, sy] => Ok(Affine::scale_non_uniform(*sx, *sy)),
            _ => Err(count("1 or 2")),
        },
        "rotate" => match args {
            [deg] => Ok(Affine::rotate(deg.to_radians())),
            [deg, cx, cy] => Ok(Affine::translate((*cx, *cy))
                * Affine::rotate(deg.to_radians())
                * Affine::translate((-cx, -cy))),
            _ => Err(count("1 or 3")),
        },
        "skewX" => match args {
            [deg] => Ok(Affine::new([1.0, 0.0, deg.to_radians().tan(), 1.0, 0.0, 0.0])),
            _ => Err(count("1")),
        },
        "skewY" => match args {
            [deg] => Ok(Affine::new([1.0, deg.to_radians().tan(), 0.0, 1.0, 0.0, 0.0])),
            _ => Err(count("1")),
        },
        other => Err(TransformError::UnknownFunction(other.to_string())),
    }
}
