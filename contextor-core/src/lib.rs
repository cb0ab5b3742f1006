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

//! Contextor Core
//!
//! Fundamental data structures for the context event store: the immutable
//! event record, its canonical checksum, the ingestion-time importance
//! scorer, and the shared error taxonomy.

pub mod error;
pub mod event;
pub mod importance;

pub use error::{ContextorError, Result};
pub use event::{ContextEvent, EventDraft};
pub use importance::{score, IMPORTANCE_MAX, IMPORTANCE_MIN};
