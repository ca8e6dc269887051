use crate::config::OrientationConfig;
use crate::math::Vec3;
use crate::protocol::{self, Command};
use crate::{DepthPlaneError, Result};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};

/// Client for the phone-side orientation server.
///
/// Every query opens a fresh TCP connection, writes one command line, reads
/// one reply line and closes. There is no retry; a failed connection is
/// returned to the caller.
#[derive(Debug, Clone)]
pub struct OrientationClient {
    config: OrientationConfig,
}

impl OrientationClient {
    pub fn new(config: OrientationConfig) -> Self {
        log::info!("Orientation client for {}", config.addr);
        Self { config }
    }

    pub fn config(&self) -> &OrientationConfig {
        &self.config
    }

    /// Send a command and return the reply line without its terminator.
    ///
    /// 1. Resolves the configured address and connects with the connect timeout
    /// 2. Writes the request line and flushes
    /// 3. Reads exactly one line (an immediate close reads as empty)
    pub fn transaction(&self, cmd: Command) -> Result<String> {
        let stream = self.connect()?;
        stream.set_read_timeout(Some(self.config.io_timeout))?;
        stream.set_write_timeout(Some(self.config.io_timeout))?;

        let mut writer = &stream;
        writer.write_all(protocol::build_request(cmd).as_bytes())?;
        writer.flush()?;

        let mut line = String::new();
        BufReader::new(&stream).read_line(&mut line)?;
        log::trace!("{} -> {:?}", cmd.as_str(), line);
        Ok(protocol::trim_reply(&line).to_string())
    }

    fn connect(&self) -> Result<TcpStream> {
        let mut last_err = None;
        for addr in self.config.addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.config.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }
        Err(DepthPlaneError::Io(last_err.unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} resolved to no addresses", self.config.addr),
            )
        })))
    }

    /// Current device orientation; the zero vector when the phone has no reading.
    pub fn orientation(&self) -> Result<Vec3> {
        let reply = self.transaction(Command::Orientation)?;
        protocol::parse_orientation(&reply)
    }

    /// Raw location text as reported by the phone.
    pub fn location(&self) -> Result<String> {
        self.transaction(Command::Location)
    }

    pub fn rotation_axis(&self) -> Result<Vec3> {
        Ok(rotation_axis(self.orientation()?))
    }

    pub fn rotation_angle(&self) -> Result<f64> {
        Ok(rotation_angle(self.orientation()?))
    }

    pub fn x_angle(&self) -> Result<f64> {
        Ok(x_angle(self.orientation()?))
    }

    pub fn y_angle(&self) -> Result<f64> {
        Ok(y_angle(self.orientation()?))
    }
}

impl Default for OrientationClient {
    fn default() -> Self {
        Self::new(OrientationConfig::default())
    }
}

/// Unit axis rotating world up onto `n`; zero when `n` is zero or parallel to up.
pub fn rotation_axis(n: Vec3) -> Vec3 {
    if n.is_zero() {
        return Vec3::ZERO;
    }
    Vec3::UP.cross(n).normalized().unwrap_or(Vec3::ZERO)
}

/// Angle in radians between world up and `n`; 0 when `n` is zero.
pub fn rotation_angle(n: Vec3) -> f64 {
    let mag = n.magnitude();
    if mag == 0.0 {
        return 0.0;
    }
    (n.dot(Vec3::UP) / mag).clamp(-1.0, 1.0).acos()
}

/// `atan2(z, x)`; 0 when `n` is zero.
pub fn x_angle(n: Vec3) -> f64 {
    if n.is_zero() {
        0.0
    } else {
        n.z.atan2(n.x)
    }
}

/// `atan2(z, y)`; 0 when `n` is zero.
pub fn y_angle(n: Vec3) -> f64 {
    if n.is_zero() {
        0.0
    } else {
        n.z.atan2(n.y)
    }
}
