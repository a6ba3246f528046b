use crate::object::BigIntPrimitive;
use crate::object::JsObject;
use crate::property::PropertySlot;
use crate::stats::RuntimeCounters;
use crate::string::StringPrimitive;
use crate::value::CellId;
use crate::value::Value;
use std::mem;
use std::sync::Arc;

/// Heap configuration and memory limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapLimits {
  /// Hard memory limit for live heap allocations, in bytes.
  pub max_bytes: usize,
  /// When an allocation would cause `used_bytes` to exceed this threshold, the runtime collects
  /// garbage before attempting the allocation.
  pub gc_threshold: usize,
}

impl HeapLimits {
  pub fn new(max_bytes: usize, gc_threshold: usize) -> Self {
    Self {
      max_bytes,
      gc_threshold,
    }
  }
}

pub(crate) enum HeapCell {
  String(StringPrimitive),
  BigInt(BigIntPrimitive),
  Object(JsObject),
}

impl HeapCell {
  pub(crate) fn size_of(&self) -> usize {
    CELL_OVERHEAD
      + match self {
        HeapCell::String(s) => s.payload_bytes(),
        HeapCell::BigInt(b) => b.payload_bytes(),
        HeapCell::Object(o) => {
          o.properties.len() * PROPERTY_SLOT_BYTES + o.slots.len() * mem::size_of::<Value>()
        }
      }
  }

  fn for_each_value(&self, f: &mut dyn FnMut(Value)) {
    if let HeapCell::Object(o) = self {
      o.for_each_value(f);
    }
  }

  fn for_each_value_mut(&mut self, f: &mut dyn FnMut(&mut Value)) {
    if let HeapCell::Object(o) = self {
      o.for_each_value_mut(f);
    }
  }
}

struct Cell {
  bytes: usize,
  data: HeapCell,
}

pub(crate) const CELL_OVERHEAD: usize = mem::size_of::<Cell>();
pub(crate) const PROPERTY_SLOT_BYTES: usize = mem::size_of::<PropertySlot>();

const DEAD: u32 = u32::MAX;

/// Result of one collection cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Collection {
  pub(crate) before_bytes: usize,
  pub(crate) after_bytes: usize,
  pub(crate) freed_cells: usize,
  pub(crate) moved_cells: usize,
}

/// A precise, compacting heap.
///
/// Cells live in a dense `Vec` addressed by [`CellId`]. Collection marks everything reachable from
/// the roots supplied by the runtime, then slides live cells down over the dead ones, preserving
/// their relative order. Every reference, both inside cells and in the roots, is rewritten through
/// a forwarding table, so a `CellId` observed before a collection must not be used after it.
pub(crate) struct Heap {
  limits: HeapLimits,
  initial_threshold: usize,
  used_bytes: usize,
  gc_runs: u64,
  cells: Vec<Cell>,
  counters: Arc<RuntimeCounters>,
}

impl Heap {
  pub(crate) fn new(limits: HeapLimits, counters: Arc<RuntimeCounters>) -> Self {
    debug_assert!(
      limits.gc_threshold <= limits.max_bytes,
      "gc_threshold should be <= max_bytes"
    );
    Self {
      limits,
      initial_threshold: limits.gc_threshold,
      used_bytes: 0,
      gc_runs: 0,
      cells: Vec::new(),
      counters,
    }
  }

  pub(crate) fn limits(&self) -> HeapLimits {
    self.limits
  }

  pub(crate) fn used_bytes(&self) -> usize {
    self.used_bytes
  }

  pub(crate) fn gc_runs(&self) -> u64 {
    self.gc_runs
  }

  pub(crate) fn live_cells(&self) -> usize {
    self.cells.len()
  }

  pub(crate) fn counters(&self) -> &Arc<RuntimeCounters> {
    &self.counters
  }

  /// Whether allocating `bytes` more should be preceded by a collection.
  pub(crate) fn wants_collection(&self, bytes: usize) -> bool {
    self.used_bytes.saturating_add(bytes) > self.limits.gc_threshold
  }

  /// Whether `bytes` more fit under the hard limit.
  pub(crate) fn fits(&self, bytes: usize) -> bool {
    self.used_bytes.saturating_add(bytes) <= self.limits.max_bytes
  }

  /// Stores a cell. The caller must already have reserved its size.
  pub(crate) fn alloc(&mut self, data: HeapCell) -> CellId {
    let bytes = data.size_of();
    let id = CellId(self.cells.len() as u32);
    self.cells.push(Cell { bytes, data });
    self.used_bytes += bytes;
    self.counters.record_allocation();
    self.counters.record_used_bytes(self.used_bytes);
    id
  }

  /// Accounts for growth of an existing cell (e.g. a new property).
  pub(crate) fn grow(&mut self, id: CellId, bytes: usize) {
    if let Some(cell) = self.cells.get_mut(id.0 as usize) {
      cell.bytes += bytes;
      self.used_bytes += bytes;
      self.counters.record_used_bytes(self.used_bytes);
    }
  }

  pub(crate) fn get(&self, id: CellId) -> Option<&HeapCell> {
    self.cells.get(id.0 as usize).map(|c| &c.data)
  }

  pub(crate) fn string(&self, id: CellId) -> Option<&StringPrimitive> {
    match self.get(id) {
      Some(HeapCell::String(s)) => Some(s),
      _ => None,
    }
  }

  pub(crate) fn bigint(&self, id: CellId) -> Option<&BigIntPrimitive> {
    match self.get(id) {
      Some(HeapCell::BigInt(b)) => Some(b),
      _ => None,
    }
  }

  pub(crate) fn object(&self, id: CellId) -> Option<&JsObject> {
    match self.get(id) {
      Some(HeapCell::Object(o)) => Some(o),
      _ => None,
    }
  }

  pub(crate) fn object_mut(&mut self, id: CellId) -> Option<&mut JsObject> {
    match self.cells.get_mut(id.0 as usize).map(|c| &mut c.data) {
      Some(HeapCell::Object(o)) => Some(o),
      _ => None,
    }
  }

  /// Runs a full mark/compact cycle.
  ///
  /// `visit_roots` is called twice: once to mark from every root, then to rewrite every root
  /// through the forwarding table.
  pub(crate) fn collect<R>(&mut self, mut visit_roots: R) -> Collection
  where
    R: FnMut(&mut dyn FnMut(&mut Value)),
  {
    let before_bytes = self.used_bytes;
    let before_cells = self.cells.len();

    let mut marks = vec![false; self.cells.len()];
    let mut worklist: Vec<u32> = Vec::new();
    visit_roots(&mut |value: &mut Value| mark_value(*value, &mut marks, &mut worklist));
    while let Some(index) = worklist.pop() {
      self.cells[index as usize]
        .data
        .for_each_value(&mut |value: Value| mark_value(value, &mut marks, &mut worklist));
    }

    let mut forward = vec![DEAD; self.cells.len()];
    let mut next = 0u32;
    let mut moved_cells = 0;
    for (index, live) in marks.iter().enumerate() {
      if *live {
        if next as usize != index {
          moved_cells += 1;
        }
        forward[index] = next;
        next += 1;
      }
    }

    let mut used_bytes = 0;
    let cells = mem::take(&mut self.cells);
    self.cells = cells
      .into_iter()
      .zip(marks)
      .filter_map(|(cell, live)| {
        if live {
          used_bytes += cell.bytes;
          Some(cell)
        } else {
          None
        }
      })
      .collect();

    for cell in &mut self.cells {
      cell
        .data
        .for_each_value_mut(&mut |value: &mut Value| *value = relocate(*value, &forward));
    }
    visit_roots(&mut |value: &mut Value| *value = relocate(*value, &forward));

    self.used_bytes = used_bytes;
    self.gc_runs += 1;
    self.limits.gc_threshold = used_bytes
      .saturating_mul(2)
      .clamp(self.initial_threshold, self.limits.max_bytes);
    self.counters.record_gc();
    self.counters.record_used_bytes(used_bytes);

    Collection {
      before_bytes,
      after_bytes: used_bytes,
      freed_cells: before_cells - self.cells.len(),
      moved_cells,
    }
  }
}

fn mark_value(value: Value, marks: &mut [bool], worklist: &mut Vec<u32>) {
  let Some(id) = value.as_cell() else {
    return;
  };
  match marks.get_mut(id.0 as usize) {
    Some(mark) if !*mark => {
      *mark = true;
      worklist.push(id.0);
    }
    Some(_) => {}
    None => debug_assert!(false, "root refers to a cell past the end of the heap: {value:?}"),
  }
}

fn relocate(value: Value, forward: &[u32]) -> Value {
  let Some(id) = value.as_cell() else {
    return value;
  };
  match forward.get(id.0 as usize) {
    Some(&target) if target != DEAD => value.with_cell(CellId(target)),
    _ => {
      debug_assert!(false, "live reference to a collected cell: {value:?}");
      value
    }
  }
}
