use std::{
    net::TcpListener,
    path::Path,
    process::{Child, Command, Stdio},
    thread,
    time::Duration,
};

use tracing::info;

use crate::error::{AddContext, Error};

/// A chromedriver child process. The process is killed when this value is dropped.
pub struct ChromeDriver {
    child: Child,
    port: u16,
    stopped: bool,
}

impl ChromeDriver {
    /// Starts chromedriver as a child process on `port`
    ///
    /// # Returns
    /// - [`ChromeDriver`] once the process is listening on the port
    ///
    /// # Errors
    /// - [`crate::Error`] if the binary cannot be spawned, if `port` is already in use, or if the
    /// chromedriver process exits or fails to bind to the port within one second
    pub fn start(binary: &Path, port: u16) -> Result<Self, Error> {
        if is_port_in_use(port) {
            return Err(Error::from(format!("Port {port} is already in use"))
                .add_context("starting chromedriver"));
        }

        let child = Command::new(binary)
            .arg(format!("--port={port}"))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(Error::from)
            .add_context(&format!("spawning '{}'", binary.display()))
            .add_context("starting chromedriver")?;
        let mut driver = ChromeDriver {
            child,
            port,
            stopped: false,
        };

        for _ in 0..100 {
            if is_port_in_use(port) {
                info!(port, "chromedriver started");
                return Ok(driver);
            }

            if driver
                .child
                .try_wait()
                .map_err(Error::from)
                .add_context("starting chromedriver")?
                .is_some()
            {
                driver.stopped = true;
                return Err(
                    Error::from(String::from("Chromedriver has stopped unexpectedly"))
                        .add_context("starting chromedriver"),
                );
            }

            thread::sleep(Duration::from_millis(10));
        }

        // Double-check port is now in use; dropping the driver kills the process otherwise
        if !is_port_in_use(port) {
            return Err(
                Error::from(format!("Chromedriver failed to bind to port {port}"))
                    .add_context("starting chromedriver"),
            );
        }

        info!(port, "chromedriver started");
        Ok(driver)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// WebDriver endpoint served by this process
    pub fn url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    /// Kill the process and wait for it to exit
    pub fn stop(mut self) -> Result<(), Error> {
        self.stopped = true;
        self.child
            .kill()
            .map_err(Error::from)
            .add_context("killing chromedriver process")?;
        self.child
            .wait()
            .map_err(Error::from)
            .add_context("waiting for chromedriver to exit")?;
        info!(port = self.port, "chromedriver stopped");
        Ok(())
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        if !self.stopped {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Check if a given port is currently in use
///
/// # Arguments
/// - `port` The port number to check
///
/// # Returns
/// - `true` if the TCP port is currently in use on the localhost
/// - `false` if the TCP port is not being used on localhost
pub fn is_port_in_use(port: u16) -> bool {
    TcpListener::bind(format!("localhost:{port}")).is_err()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn free_port() -> u16 {
        TcpListener::bind("localhost:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    #[test]
    fn detects_ports_in_use() {
        let listener = TcpListener::bind("localhost:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(is_port_in_use(port));
        drop(listener);
        assert!(!is_port_in_use(port));
    }

    #[test]
    fn missing_binary_is_an_error() {
        let err = ChromeDriver::start(Path::new("/nonexistent/chromedriver"), free_port())
            .err()
            .unwrap();
        assert!(err.to_string().starts_with("starting chromedriver -> spawning"));
    }

    #[test]
    fn refuses_busy_port() {
        let listener = TcpListener::bind("localhost:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let err = ChromeDriver::start(Path::new("chromedriver"), port)
            .err()
            .unwrap();
        assert!(err.to_string().contains("already in use"));
    }
}
