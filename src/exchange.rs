use serde::{Deserialize, Serialize};

/// One question paired with the answer it received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub query: String,
    pub response: String,
}

impl Exchange {
    pub fn new(query: impl Into<String>, response: impl Into<String>) -> Self {
        Exchange {
            query: query.into(),
            response: response.into(),
        }
    }
}

/// Append-only conversation history. Position in the log is the only identity
/// an exchange has; entries are never edited, removed or reordered.
#[derive(Debug, Default, Clone)]
pub struct ExchangeLog {
    exchanges: Vec<Exchange>,
}

impl ExchangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a completed exchange and return its position.
    pub fn append(&mut self, exchange: Exchange) -> usize {
        self.exchanges.push(exchange);
        self.exchanges.len() - 1
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Exchange> {
        self.exchanges.get(index)
    }

    pub fn latest(&self) -> Option<&Exchange> {
        self.exchanges.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Exchange> {
        self.exchanges.iter()
    }

    pub fn as_slice(&self) -> &[Exchange] {
        &self.exchanges
    }
}

impl<'a> IntoIterator for &'a ExchangeLog {
    type Item = &'a Exchange;
    type IntoIter = std::slice::Iter<'a, Exchange>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
