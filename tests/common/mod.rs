//! In-memory stand-in for a managed runtime.
//!
//! Frame chains live in a shared atomic arena and are mutated while the
//! sampler reads them, so the optimistic-read protocol is exercised by
//! real concurrent mutation, not by mocks returning canned answers.

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use taskprof::{
    FrameId, FunctionInfo, RawFrame, RawFrameKind, RuntimeIntrospection, SymbolId, ThreadId,
    ThreadInfo,
};

const ARENA_SLOTS: usize = 65_536;
const NO_FRAME: usize = usize::MAX;

struct Slot {
    symbol: AtomicU64,
    lineno: AtomicU32,
    kind: AtomicU32,
    previous: AtomicUsize,
}

impl Slot {
    fn empty() -> Self {
        Self {
            symbol: AtomicU64::new(0),
            lineno: AtomicU32::new(0),
            kind: AtomicU32::new(0),
            previous: AtomicUsize::new(NO_FRAME),
        }
    }
}

fn encode_kind(kind: RawFrameKind) -> u32 {
    match kind {
        RawFrameKind::Interpreted => 0,
        RawFrameKind::Native => 1,
        RawFrameKind::SuspendedCoroutine => 2,
    }
}

fn decode_kind(raw: u32) -> RawFrameKind {
    match raw {
        1 => RawFrameKind::Native,
        2 => RawFrameKind::SuspendedCoroutine,
        _ => RawFrameKind::Interpreted,
    }
}

struct ThreadState {
    info: ThreadInfo,
    alive: AtomicBool,
    /// Odd while a push/pop/park is rewriting the chain.
    generation: AtomicU64,
    head: AtomicUsize,
}

pub struct FakeRuntime {
    slots: Vec<Slot>,
    next_slot: AtomicUsize,
    arena_generation: AtomicU64,
    threads: Mutex<Vec<Arc<ThreadState>>>,
    next_thread_id: AtomicU64,
    functions: Mutex<HashMap<SymbolId, FunctionInfo>>,
    next_symbol: AtomicU64,
}

impl FakeRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            slots: std::iter::repeat_with(Slot::empty)
                .take(ARENA_SLOTS)
                .collect(),
            next_slot: AtomicUsize::new(0),
            arena_generation: AtomicU64::new(2),
            threads: Mutex::new(Vec::new()),
            next_thread_id: AtomicU64::new(1),
            functions: Mutex::new(HashMap::new()),
            next_symbol: AtomicU64::new(1),
        })
    }

    /// Intern an interpreted-level function; returns its symbol.
    pub fn define_function(&self, name: &str, filename: &str) -> SymbolId {
        let symbol = self.next_symbol.fetch_add(1, Ordering::SeqCst);
        self.functions.lock().unwrap().insert(
            symbol,
            FunctionInfo {
                name: name.to_owned(),
                filename: filename.to_owned(),
            },
        );
        symbol
    }

    /// A symbol the runtime only knows as native code.
    pub fn define_native_symbol(&self) -> SymbolId {
        self.next_symbol.fetch_add(1, Ordering::SeqCst)
    }

    pub fn spawn_thread(self: &Arc<Self>, name: &str) -> FakeThread {
        let id = self.next_thread_id.fetch_add(1, Ordering::SeqCst);
        let state = Arc::new(ThreadState {
            info: ThreadInfo {
                id,
                name: name.to_owned(),
                native_thread_id: 1000 + id,
            },
            alive: AtomicBool::new(true),
            generation: AtomicU64::new(2),
            head: AtomicUsize::new(NO_FRAME),
        });
        self.threads.lock().unwrap().push(Arc::clone(&state));
        FakeThread {
            runtime: Arc::clone(self),
            state,
        }
    }

    fn alloc_slot(&self, frame: RawFrame) -> FrameId {
        let id = self.next_slot.fetch_add(1, Ordering::SeqCst) % ARENA_SLOTS;
        let slot = &self.slots[id];
        slot.symbol.store(frame.symbol, Ordering::SeqCst);
        slot.lineno.store(frame.lineno, Ordering::SeqCst);
        slot.kind.store(encode_kind(frame.kind), Ordering::SeqCst);
        slot.previous
            .store(frame.previous.unwrap_or(NO_FRAME), Ordering::SeqCst);
        id
    }

    fn state_of(&self, thread: ThreadId) -> Option<Arc<ThreadState>> {
        self.threads
            .lock()
            .unwrap()
            .iter()
            .find(|state| state.info.id == thread)
            .map(Arc::clone)
    }
}

impl RuntimeIntrospection for FakeRuntime {
    fn hooks_installed(&self) -> bool {
        true
    }

    fn threads(&self) -> Vec<ThreadInfo> {
        self.threads
            .lock()
            .unwrap()
            .iter()
            .filter(|state| state.alive.load(Ordering::SeqCst))
            .map(|state| state.info.clone())
            .collect()
    }

    fn chain_generation(&self, thread: ThreadId) -> Option<u64> {
        let state = self.state_of(thread)?;
        state
            .alive
            .load(Ordering::SeqCst)
            .then(|| state.generation.load(Ordering::SeqCst))
    }

    fn chain_head(&self, thread: ThreadId) -> Option<Option<FrameId>> {
        let state = self.state_of(thread)?;
        if !state.alive.load(Ordering::SeqCst) {
            return None;
        }
        let head = state.head.load(Ordering::SeqCst);
        Some((head != NO_FRAME).then_some(head))
    }

    fn arena_generation(&self) -> u64 {
        self.arena_generation.load(Ordering::SeqCst)
    }

    fn frame(&self, id: FrameId) -> Option<RawFrame> {
        let slot = self.slots.get(id)?;
        let previous = slot.previous.load(Ordering::SeqCst);
        Some(RawFrame {
            symbol: slot.symbol.load(Ordering::SeqCst),
            lineno: slot.lineno.load(Ordering::SeqCst),
            kind: decode_kind(slot.kind.load(Ordering::SeqCst)),
            previous: (previous != NO_FRAME).then_some(previous),
        })
    }

    fn function(&self, symbol: SymbolId) -> Option<FunctionInfo> {
        self.functions.lock().unwrap().get(&symbol).cloned()
    }
}

/// Mutator-side handle for one fake thread. Push/pop/park follow the
/// generation protocol: odd while rewriting, bumped to the next even value
/// when the chain is consistent again.
pub struct FakeThread {
    runtime: Arc<FakeRuntime>,
    state: Arc<ThreadState>,
}

impl FakeThread {
    pub fn id(&self) -> ThreadId {
        self.state.info.id
    }

    pub fn push_frame(&self, symbol: SymbolId, lineno: u32, kind: RawFrameKind) -> FrameId {
        self.state.generation.fetch_add(1, Ordering::SeqCst);
        let head = self.state.head.load(Ordering::SeqCst);
        let slot = self.runtime.alloc_slot(RawFrame {
            symbol,
            lineno,
            kind,
            previous: (head != NO_FRAME).then_some(head),
        });
        self.state.head.store(slot, Ordering::SeqCst);
        self.state.generation.fetch_add(1, Ordering::SeqCst);
        slot
    }

    pub fn pop_frame(&self) {
        self.state.generation.fetch_add(1, Ordering::SeqCst);
        let head = self.state.head.load(Ordering::SeqCst);
        if head != NO_FRAME {
            let previous = self.runtime.slots[head].previous.load(Ordering::SeqCst);
            self.state.head.store(previous, Ordering::SeqCst);
        }
        self.state.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Detach the whole chain, as a coroutine parking at an await point.
    /// Returns the head to hand to a `Suspended` event; the frames stay
    /// live in the arena until the task resumes or completes.
    pub fn park(&self) -> Option<FrameId> {
        self.state.generation.fetch_add(1, Ordering::SeqCst);
        let head = self.state.head.swap(NO_FRAME, Ordering::SeqCst);
        self.state.generation.fetch_add(1, Ordering::SeqCst);
        (head != NO_FRAME).then_some(head)
    }

    pub fn terminate(&self) {
        self.state.alive.store(false, Ordering::SeqCst);
    }
}

/// `Write` target that can be inspected after the emitter is done with it.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
