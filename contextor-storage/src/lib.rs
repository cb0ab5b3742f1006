// Copyright 2025 Contextor Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Contextor Storage Layer
//!
//! Durable, source-of-truth stores: the append-only event log and the
//! Git-style memory journal. Both use sync I/O (std::fs) with per-stream
//! locking; derived indexes live in `contextor-index` and can be rebuilt
//! from here by replay.

pub mod event_store;
pub mod journal;

pub use event_store::{EventStore, StoreStats};
pub use journal::{JournalCommit, JournalStats, MemoryJournal, ObjectId, Session};
