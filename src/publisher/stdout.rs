use std::io::{self, Write};
use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;

use super::{PublishError, Publisher};

#[derive(Serialize)]
struct Line<'a> {
    topic: &'a str,
    message: &'a Value,
}

/// Writes one JSON line `{"topic":..,"message":..}` per message.
pub struct StdoutPublisher {
    out: Mutex<Box<dyn Write + Send>>,
}

impl StdoutPublisher {
    /// Publisher writing to standard output.
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }

    /// Publisher writing to any sink.
    pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(writer)),
        }
    }
}

impl Default for StdoutPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StdoutPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdoutPublisher").finish_non_exhaustive()
    }
}

impl Publisher for StdoutPublisher {
    fn publish(&self, topic: &str, message: &Value) -> Result<(), PublishError> {
        let mut line = serde_json::to_vec(&Line { topic, message })?;
        line.push(b'\n');

        let mut out = self
            .out
            .lock()
            .map_err(|_| PublishError::Client("stdout writer poisoned".into()))?;
        out.write_all(&line)
            .and_then(|()| out.flush())
            .map_err(|e| PublishError::Client(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writes_json_lines() {
        let buf = SharedBuf::default();
        let publisher = StdoutPublisher::with_writer(buf.clone());
        publisher.publish("a", &json!({"x": 1})).unwrap();
        publisher.publish("b", &json!([1.5])).unwrap();

        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], json!({"topic": "a", "message": {"x": 1}}));
        assert_eq!(lines[1]["message"][0], 1.5);
    }
}
