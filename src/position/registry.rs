use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::BotError;
use crate::models::Position;
use crate::Result;

/// The authoritative map of open positions, keyed by symbol.
///
/// One position per symbol is enforced structurally by the key. All mutation
/// goes through `insert` and `remove` under the write lock; reads hand out
/// clones so no lock is ever held across a network call.
#[derive(Default)]
pub struct PositionRegistry {
    positions: RwLock<HashMap<String, Position>>,
}

impl PositionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly opened position.
    ///
    /// Fails with `DuplicatePosition` when the symbol already has one; the
    /// check and the insert happen under a single write lock.
    pub fn insert(&self, position: Position) -> Result<()> {
        let mut positions = self.positions.write().unwrap();
        match positions.entry(position.symbol.clone()) {
            Entry::Occupied(_) => Err(BotError::DuplicatePosition(position.symbol)),
            Entry::Vacant(slot) => {
                slot.insert(position);
                Ok(())
            }
        }
    }

    /// Point-in-time copy of the position for a symbol
    pub fn get(&self, symbol: &str) -> Option<Position> {
        self.positions.read().unwrap().get(symbol).cloned()
    }

    /// Remove and return the position for a symbol
    pub fn remove(&self, symbol: &str) -> Result<Position> {
        self.positions
            .write()
            .unwrap()
            .remove(symbol)
            .ok_or_else(|| BotError::NotFound(symbol.to_string()))
    }

    /// Point-in-time copy of the tracked symbols, safe to iterate while
    /// other tasks insert and remove
    pub fn snapshot_symbols(&self) -> Vec<String> {
        self.positions.read().unwrap().keys().cloned().collect()
    }

    /// Point-in-time copy of all open positions
    pub fn snapshot(&self) -> Vec<Position> {
        self.positions.read().unwrap().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.positions.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.positions.read().unwrap().contains_key(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;
    use chrono::Utc;

    fn test_position(symbol: &str) -> Position {
        Position {
            symbol: symbol.to_string(),
            direction: Direction::Long,
            entry_price: 100.0,
            quantity: 1.0,
            take_profit: 104.0,
            stop_loss: 98.0,
            opened_at: Utc::now(),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let registry = PositionRegistry::new();
        registry.insert(test_position("BTCUSDT")).unwrap();

        assert_eq!(registry.len(), 1);
        let position = registry.get("BTCUSDT").unwrap();
        assert_eq!(position.entry_price, 100.0);
        assert!(registry.get("ETHUSDT").is_none());
    }

    #[test]
    fn test_duplicate_insert_fails() {
        let registry = PositionRegistry::new();
        registry.insert(test_position("BTCUSDT")).unwrap();

        let result = registry.insert(test_position("BTCUSDT"));
        assert!(matches!(result, Err(BotError::DuplicatePosition(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove() {
        let registry = PositionRegistry::new();
        registry.insert(test_position("BTCUSDT")).unwrap();

        let removed = registry.remove("BTCUSDT").unwrap();
        assert_eq!(removed.symbol, "BTCUSDT");
        assert!(registry.is_empty());

        let result = registry.remove("BTCUSDT");
        assert!(matches!(result, Err(BotError::NotFound(_))));
    }

    #[test]
    fn test_snapshot_symbols() {
        let registry = PositionRegistry::new();
        registry.insert(test_position("BTCUSDT")).unwrap();
        registry.insert(test_position("ETHUSDT")).unwrap();

        let mut symbols = registry.snapshot_symbols();
        symbols.sort();
        assert_eq!(symbols, vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[test]
    fn test_concurrent_inserts_distinct_symbols() {
        use std::sync::Arc;

        let registry = Arc::new(PositionRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.insert(test_position(&format!("SYM{}", i))))
            })
            .collect();

        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(registry.len(), 8);
    }

    #[test]
    fn test_concurrent_inserts_same_symbol_one_wins() {
        use std::sync::Arc;

        let registry = Arc::new(PositionRegistry::new());
        let successes: usize = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.insert(test_position("BTCUSDT")).is_ok())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();

        assert_eq!(successes, 1);
        assert_eq!(registry.len(), 1);
    }
}
