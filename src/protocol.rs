use crate::math::Vec3;
use crate::{DepthPlaneError, Result};

// -- Endpoint --
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

// -- Command strings --
pub const CMD_ORIENTATION: &str = "get-orientation";
pub const CMD_LOCATION: &str = "get-location";

/// Separator between the vector components of an orientation reply.
pub const FIELD_SEPARATOR: char = ':';

/// Query understood by the phone-side orientation server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Orientation,
    Location,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Orientation => CMD_ORIENTATION,
            Command::Location => CMD_LOCATION,
        }
    }
}

/// Build the request line for a command: the command text plus `\n`.
pub fn build_request(cmd: Command) -> String {
    let mut line = String::with_capacity(cmd.as_str().len() + 1);
    line.push_str(cmd.as_str());
    line.push('\n');
    line
}

/// Strip the line terminator (`\n` or `\r\n`) and surrounding whitespace.
pub fn trim_reply(line: &str) -> &str {
    line.trim()
}

/// Parse an orientation reply of the form `x:y:z`.
///
/// An empty reply means the phone has no reading yet and parses to the
/// zero vector.
pub fn parse_orientation(line: &str) -> Result<Vec3> {
    let line = trim_reply(line);
    if line.is_empty() {
        return Ok(Vec3::ZERO);
    }

    let mut fields = line.split(FIELD_SEPARATOR);
    let mut next = || -> Result<f64> {
        let field = fields
            .next()
            .ok_or_else(|| DepthPlaneError::InvalidResponse(line.to_string()))?;
        let value: f64 = field
            .trim()
            .parse()
            .map_err(|_| DepthPlaneError::InvalidResponse(line.to_string()))?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(DepthPlaneError::InvalidResponse(line.to_string()))
        }
    };
    let v = Vec3::new(next()?, next()?, next()?);

    if fields.next().is_some() {
        return Err(DepthPlaneError::InvalidResponse(line.to_string()));
    }
    Ok(v)
}

/// Format a vector the way the server writes it (six decimals).
pub fn format_orientation(v: Vec3) -> String {
    format!("{:.6}:{:.6}:{:.6}", v.x, v.y, v.z)
}
