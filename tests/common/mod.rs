//! Hand-rolled fakes shared by the store and sync integration tests.
//!
//! `FakeSheetTransport` keeps a whole worksheet in memory and interprets
//! the same A1-notation ranges the real transport sends, so the store
//! logic under test is exactly the production code path minus HTTP.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use tagsync::management::{AuthError, TokenSupplier};
use tagsync::store::{SheetsTransport, TransportError};

fn column_index(letters: &str) -> usize {
    letters
        .bytes()
        .fold(0usize, |acc, b| acc * 26 + (b - b'A') as usize + 1)
        - 1
}

// "E6" -> (4, Some(6)); "G" -> (6, None)
fn parse_ref(a1: &str) -> (usize, Option<usize>) {
    let letters: String = a1.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let digits: String = a1.chars().skip_while(|c| c.is_ascii_alphabetic()).collect();
    (column_index(&letters), digits.parse::<usize>().ok())
}

/// In-memory worksheet behind the production `SheetsTransport` trait.
pub struct FakeSheetTransport {
    pub rows: Arc<Mutex<Vec<Vec<String>>>>,
    pub reads: Arc<AtomicU32>,
    pub writes: Arc<AtomicU32>,
    pub read_failures: Arc<Mutex<VecDeque<TransportError>>>,
    pub write_failures: Arc<Mutex<VecDeque<TransportError>>>,
    pub fail_all_writes_unauthorized: bool,
}

impl FakeSheetTransport {
    pub fn new(seed: Vec<Vec<String>>) -> Self {
        Self::with_rows(Arc::new(Mutex::new(seed)))
    }

    pub fn with_rows(rows: Arc<Mutex<Vec<Vec<String>>>>) -> Self {
        FakeSheetTransport {
            rows,
            reads: Arc::new(AtomicU32::new(0)),
            writes: Arc::new(AtomicU32::new(0)),
            read_failures: Arc::new(Mutex::new(VecDeque::new())),
            write_failures: Arc::new(Mutex::new(VecDeque::new())),
            fail_all_writes_unauthorized: false,
        }
    }

    fn cell(rows: &[Vec<String>], row: usize, col: usize) -> String {
        rows.get(row)
            .and_then(|r| r.get(col))
            .cloned()
            .unwrap_or_default()
    }

    fn interpret_read(rows: &[Vec<String>], range: &str) -> Vec<Vec<String>> {
        let a1 = range.split('!').nth(1).expect("range without sheet name");

        match a1.split_once(':') {
            // single cell, e.g. "E6"
            None => {
                let (col, row) = parse_ref(a1);
                let row = row.expect("cell ref without row");
                if row > rows.len() {
                    return Vec::new();
                }
                vec![vec![Self::cell(rows, row - 1, col)]]
            }
            Some((start, end)) => {
                let (start_col, start_row) = parse_ref(start);
                let (end_col, end_row) = parse_ref(end);
                match end_row {
                    // open-ended column scan, e.g. "G2:G"
                    None => {
                        let first = start_row.unwrap_or(1);
                        rows.iter()
                            .skip(first - 1)
                            .map(|r| vec![r.get(start_col).cloned().unwrap_or_default()])
                            .collect()
                    }
                    // bounded rectangle, e.g. "A1:K1" or "A6:K6"
                    Some(last) => {
                        let first = start_row.unwrap_or(1);
                        (first..=last)
                            .filter(|row| *row <= rows.len())
                            .map(|row| {
                                (start_col..=end_col)
                                    .map(|col| Self::cell(rows, row - 1, col))
                                    .collect()
                            })
                            .collect()
                    }
                }
            }
        }
    }

    fn apply_update(rows: &mut Vec<Vec<String>>, range: &str, data: &[Vec<String>]) {
        let a1 = range.split('!').nth(1).expect("range without sheet name");
        let start = a1.split(':').next().unwrap();
        let (_, start_row) = parse_ref(start);
        let start_row = start_row.expect("update range without row");

        for (offset, cells) in data.iter().enumerate() {
            let index = start_row - 1 + offset;
            while rows.len() <= index {
                rows.push(Vec::new());
            }
            rows[index] = cells.clone();
        }
    }
}

#[async_trait]
impl SheetsTransport for FakeSheetTransport {
    async fn read_range(
        &self,
        _token: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, TransportError> {
        if let Some(err) = self.read_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.reads.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.lock().unwrap();
        Ok(Self::interpret_read(&rows, range))
    }

    async fn update_range(
        &self,
        _token: &str,
        range: &str,
        data: &[Vec<String>],
    ) -> Result<(), TransportError> {
        if self.fail_all_writes_unauthorized {
            return Err(TransportError::Unauthorized);
        }
        if let Some(err) = self.write_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().unwrap();
        Self::apply_update(&mut rows, range, data);
        Ok(())
    }

    async fn append_rows(
        &self,
        _token: &str,
        _range: &str,
        data: &[Vec<String>],
    ) -> Result<(), TransportError> {
        if self.fail_all_writes_unauthorized {
            return Err(TransportError::Unauthorized);
        }
        if let Some(err) = self.write_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().unwrap();
        for cells in data {
            rows.push(cells.clone());
        }
        Ok(())
    }
}

/// Token supplier that hands out a constant token and counts refreshes.
pub struct CountingTokens {
    pub refreshes: Arc<AtomicU32>,
}

impl CountingTokens {
    pub fn new() -> Self {
        CountingTokens {
            refreshes: Arc::new(AtomicU32::new(0)),
        }
    }
}

#[async_trait]
impl TokenSupplier for CountingTokens {
    async fn token(&mut self) -> Result<String, AuthError> {
        Ok("test-token".to_string())
    }

    async fn refresh(&mut self) -> Result<String, AuthError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok("test-token".to_string())
    }
}
