// history.rs

use std::io::{self, BufRead, Write};
use std::iter::FusedIterator;

pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Cursor {
    head: usize,
    tail: usize,
}

/// Fixed-capacity circular command log.
///
/// Slots are addressed modulo the capacity. Once full, every new entry
/// overwrites the oldest one and the head moves forward with it, so
/// indices handed to [`HistoryRing::resolve`] are always relative to the
/// oldest retained entry.
#[derive(Debug)]
pub struct HistoryRing {
    slots: Box<[Option<String>]>,
    cursor: Option<Cursor>,
}

impl HistoryRing {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// A capacity of zero is bumped to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity.max(1)).map(|_| None).collect();
        Self { slots, cursor: None }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        match self.cursor {
            None => 0,
            Some(Cursor { head, tail }) => (tail + self.capacity() - head) % self.capacity() + 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.is_none()
    }

    pub fn enqueue(&mut self, text: &str) {
        let cap = self.capacity();
        let cursor = match self.cursor {
            None => Cursor { head: 0, tail: 0 },
            Some(Cursor { head, tail }) => {
                let tail = (tail + 1) % cap;
                // Full: the slot we are about to take is the oldest entry.
                let head = if tail == head { (head + 1) % cap } else { head };
                Cursor { head, tail }
            }
        };
        // Assigning drops whatever evicted entry lived here.
        self.slots[cursor.tail] = Some(text.to_owned());
        self.cursor = Some(cursor);
    }

    /// Live entries oldest first, paired with their display index.
    pub fn list(&self) -> Entries<'_> {
        Entries {
            ring: self,
            next: 0,
            remaining: self.len(),
        }
    }

    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.cursor = None;
    }

    /// Raw lookup of slot `(head + n) mod capacity`.
    ///
    /// There is deliberately no check against [`len`](Self::len): an index
    /// past the live entries wraps around the slot array, and a slot that
    /// was never written (or was cleared) yields `None`.
    pub fn resolve(&self, n: usize) -> Option<&str> {
        let head = self.cursor?.head;
        let cap = self.capacity();
        self.slots[(head + n % cap) % cap].as_deref()
    }

    /// Enqueues every non-blank line, returning how many were read.
    pub fn read_from<R: BufRead>(&mut self, reader: R) -> io::Result<usize> {
        let mut count = 0;
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            self.enqueue(&line);
            count += 1;
        }
        Ok(count)
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        for (_, text) in self.list() {
            writeln!(writer, "{}", text)?;
        }
        writer.flush()
    }
}

impl Default for HistoryRing {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Entries<'a> {
    ring: &'a HistoryRing,
    next: usize,
    remaining: usize,
}

impl<'a> Iterator for Entries<'a> {
    type Item = (usize, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let index = self.next;
        let text = self.ring.resolve(index)?;
        self.next += 1;
        self.remaining -= 1;
        Some((index, text))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Entries<'_> {}

impl FusedIterator for Entries<'_> {}
