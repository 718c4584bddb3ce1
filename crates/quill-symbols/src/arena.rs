//! Generational arena owning every symbol.
//!
//! Tables and member maps hold `SymbolId`s rather than symbols, so an alias
//! can name its target without owning it. Freed slots bump their generation;
//! a handle kept across a removal no longer resolves.

use crate::types::{Symbol, SymbolId};

#[derive(Debug)]
struct Slot {
    generation: u32,
    value: Option<Symbol>,
}

#[derive(Debug, Default)]
pub struct SymbolArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl SymbolArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a symbol and return its handle
    pub fn insert(&mut self, symbol: Symbol) -> SymbolId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(symbol);
            return SymbolId::from_raw_parts(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot { generation: 0, value: Some(symbol) });
        SymbolId::from_raw_parts(index, 0)
    }

    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, id: SymbolId) -> Option<&mut Symbol> {
        self.slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.value.as_mut())
    }

    pub fn contains(&self, id: SymbolId) -> bool {
        self.get(id).is_some()
    }

    /// Free a slot. Returns the symbol if the handle was live.
    pub fn remove(&mut self, id: SymbolId) -> Option<Symbol> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        let symbol = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        self.len -= 1;
        Some(symbol)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate live symbols
    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|symbol| (SymbolId::from_raw_parts(index as u32, slot.generation), symbol))
        })
    }
}
