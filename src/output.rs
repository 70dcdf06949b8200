use crate::error::Error;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Writes every report line to the console and, when enabled, a log file
pub struct Output {
    console: Box<dyn Write>,
    /// Terminal in raw mode needs explicit carriage returns
    raw_console: bool,
    log_file: Option<BufWriter<File>>,
}

impl Output {
    pub fn new(log_path: Option<&Path>) -> Result<Self, Error> {
        let log_file = match log_path {
            Some(path) => {
                let file = File::create(path).map_err(|source| Error::LogFile {
                    path: path.to_path_buf(),
                    source,
                })?;
                log::info!("Logging events to {}", path.display());
                Some(BufWriter::new(file))
            }
            None => None,
        };

        Ok(Self {
            console: Box::new(io::stdout()),
            raw_console: false,
            log_file,
        })
    }

    pub fn set_raw_console(&mut self, raw: bool) {
        self.raw_console = raw;
    }

    pub fn line(&mut self, line: &str) -> Result<(), Error> {
        let ending = if self.raw_console { "\r\n" } else { "\n" };
        write!(self.console, "{}{}", line, ending)?;
        self.console.flush()?;

        if let Some(file) = self.log_file.as_mut() {
            writeln!(file, "{}", line)?;
        }
        Ok(())
    }

    pub fn close(mut self) -> Result<(), Error> {
        self.console.flush()?;
        if let Some(mut file) = self.log_file.take() {
            file.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
impl Output {
    /// Output writing the console side into a shared buffer
    pub fn to_buffer(buffer: std::rc::Rc<std::cell::RefCell<Vec<u8>>>) -> Self {
        struct Shared(std::rc::Rc<std::cell::RefCell<Vec<u8>>>);

        impl Write for Shared {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.borrow_mut().write(buf)
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        Self {
            console: Box::new(Shared(buffer)),
            raw_console: false,
            log_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("joytest-{}-{}", std::process::id(), name))
    }

    #[test]
    fn lines_go_to_console_and_log_file() {
        let path = temp_path("tee.log");
        let buffer = Rc::new(RefCell::new(Vec::new()));

        let mut output = Output::to_buffer(buffer.clone());
        output.log_file = Some(BufWriter::new(File::create(&path).unwrap()));
        output.line("0: Button 1 pressed").unwrap();
        output.line("0: Hat 0 moved to UP").unwrap();
        output.close().unwrap();

        let expected = "0: Button 1 pressed\n0: Hat 0 moved to UP\n";
        assert_eq!(String::from_utf8(buffer.borrow().clone()).unwrap(), expected);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), expected);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn raw_console_gets_carriage_returns_but_file_does_not() {
        let path = temp_path("raw.log");
        let buffer = Rc::new(RefCell::new(Vec::new()));

        let mut output = Output::to_buffer(buffer.clone());
        output.log_file = Some(BufWriter::new(File::create(&path).unwrap()));
        output.set_raw_console(true);
        output.line("1: Ball 0 motion: 2, 3").unwrap();
        output.close().unwrap();

        assert_eq!(
            String::from_utf8(buffer.borrow().clone()).unwrap(),
            "1: Ball 0 motion: 2, 3\r\n"
        );
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1: Ball 0 motion: 2, 3\n");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn log_file_is_truncated() {
        let path = temp_path("trunc.log");
        std::fs::write(&path, "stale contents from an earlier run\n").unwrap();

        let mut output = Output::new(Some(&path)).unwrap();
        output.console = Box::new(io::sink());
        output.line("fresh").unwrap();
        output.close().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "fresh\n");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn unopenable_log_file_is_an_error() {
        let path = temp_path("missing-dir").join("joytest.log");
        match Output::new(Some(&path)) {
            Err(Error::LogFile { path: failed, .. }) => assert_eq!(failed, path),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("log file in a missing directory should not open"),
        }
    }
}
