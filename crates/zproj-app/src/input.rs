//! 坐标输入解析
//!
//! 支持的格式：
//! - 绝对坐标: `100,50` 或 `100,50,7`
//! - 相对坐标: `@10,-5` 或 `@10,-5,1`（相对上一个坐标）
//! - 相对极坐标: `@100<45`（距离与角度，角度为度）

use thiserror::Error;
use zproj_core::filter::Coordinate;

/// 解析错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Missing value: {0}")]
    MissingValue(String),
}

/// 坐标输入解析器
pub struct InputParser;

impl InputParser {
    /// 解析一个坐标
    ///
    /// `reference` 为上一个坐标，相对输入需要它。
    pub fn parse(input: &str, reference: Option<Coordinate>) -> Result<Coordinate, ParseError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseError::InvalidFormat("Empty input".to_string()));
        }

        let (is_relative, body) = match input.strip_prefix('@') {
            Some(rest) => (true, rest.trim()),
            None => (false, input),
        };

        let relative_to = |what: &str| {
            reference.ok_or_else(|| {
                ParseError::MissingValue(format!("Reference coordinate required for {}", what))
            })
        };

        // 极坐标: "@100<45"
        if let Some((length_str, angle_str)) = body.split_once('<') {
            if !is_relative {
                return Err(ParseError::InvalidFormat(format!(
                    "Polar input must be relative: {}",
                    input
                )));
            }
            let length = Self::number(length_str, "length")?;
            let angle = Self::number(angle_str, "angle")?.to_radians();
            let origin = relative_to("relative polar coordinate")?;
            return Ok(Coordinate {
                x: origin.x + length * angle.cos(),
                y: origin.y + length * angle.sin(),
                z: origin.z,
            });
        }

        let parts: Vec<&str> = body.split(',').collect();
        let values = match parts.as_slice() {
            [x, y] => (Self::number(x, "X coordinate")?, Self::number(y, "Y coordinate")?, None),
            [x, y, z] => (
                Self::number(x, "X coordinate")?,
                Self::number(y, "Y coordinate")?,
                Some(Self::number(z, "Z coordinate")?),
            ),
            _ => {
                return Err(ParseError::InvalidFormat(format!(
                    "Cannot parse input: {}",
                    input
                )))
            }
        };

        let (x, y, z) = values;
        if !is_relative {
            return Ok(match z {
                Some(z) => Coordinate::new_3d(x, y, z),
                None => Coordinate::new(x, y),
            });
        }

        let origin = relative_to("relative coordinate")?;
        let z = match (origin.has_z(), z) {
            (true, dz) => origin.z + dz.unwrap_or(0.0),
            (false, Some(dz)) => dz,
            (false, None) => f64::NAN,
        };
        Ok(Coordinate {
            x: origin.x + x,
            y: origin.y + y,
            z,
        })
    }

    /// 依次解析多个坐标，相对输入以前一个结果为参考
    pub fn parse_all<'a>(
        inputs: impl IntoIterator<Item = &'a str>,
    ) -> Result<Vec<Coordinate>, ParseError> {
        let mut coordinates: Vec<Coordinate> = Vec::new();
        for input in inputs {
            let coordinate = Self::parse(input, coordinates.last().copied())?;
            coordinates.push(coordinate);
        }
        Ok(coordinates)
    }

    fn number(text: &str, what: &str) -> Result<f64, ParseError> {
        let text = text.trim();
        text.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ParseError::InvalidFormat(format!("Invalid {}: {}", what, text)))
    }
}

/// 坐标的文本形式，与输入格式一致
pub fn format_coordinate(c: &Coordinate) -> String {
    if c.has_z() {
        format!("{},{},{}", c.x, c.y, c.z)
    } else {
        format!("{},{}", c.x, c.y)
    }
}
