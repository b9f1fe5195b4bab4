//! Sentinel-delimited side channel emitted by the watchdog wrapper.
//!
//! Lines between a begin and an end sentinel are protocol payload, not
//! subject output. On stdout each payload line is a permission event
//! identifier; on stderr the payload describes a sandbox-level failure.

/// What one line of a stream turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Ordinary subject output.
    Text(String),
    /// A complete block of payload lines.
    Block(Vec<String>),
    /// Consumed as part of an unfinished block.
    Pending,
}

#[derive(Debug, Clone)]
pub struct WatchdogDecoder {
    begin: String,
    end: String,
    block: Option<Vec<String>>,
}

impl WatchdogDecoder {
    pub fn new(begin: &str, end: &str) -> Self {
        Self {
            begin: begin.to_string(),
            end: end.to_string(),
            block: None,
        }
    }

    pub fn in_block(&self) -> bool {
        self.block.is_some()
    }

    pub fn feed(&mut self, line: String) -> Decoded {
        let marker = line.trim();
        match self.block.as_mut() {
            None if marker == self.begin => {
                self.block = Some(Vec::new());
                Decoded::Pending
            }
            None => Decoded::Text(line),
            Some(_) if marker == self.end => Decoded::Block(self.block.take().unwrap_or_default()),
            Some(block) => {
                if !marker.is_empty() && marker != self.begin {
                    block.push(marker.to_string());
                }
                Decoded::Pending
            }
        }
    }

    /// Payload of a block left open when the stream ended.
    pub fn finish(&mut self) -> Option<Vec<String>> {
        self.block.take()
    }
}
