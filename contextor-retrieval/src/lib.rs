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

//! Contextor Retrieval Layer
//!
//! Combines the vector index, keyword index, and stored importance scores
//! into a ranked, deduplicated, token-budget-constrained context pack,
//! guided by a named policy.

pub mod engine;
pub mod pack;
pub mod policy;

pub use engine::RetrievalEngine;
pub use pack::{ContextPack, SelectedEvent, Signal};
pub use policy::{PolicyRegistry, TaskPolicy};
