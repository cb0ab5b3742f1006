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

//! Contextor Index Layer
//!
//! Derived, rebuildable lookup structures over event content: a vector
//! similarity index and a keyword inverted index. Both are caches over the
//! event store - if lost or corrupted they can be reconstructed by replaying
//! all events through `add`.
//!
//! Index updates are best-effort: a failed embedding never fails event
//! ingestion. A retrieve racing an in-flight add may simply miss that one
//! event; there is no read-your-writes guarantee across the indexes.

pub mod embedding;
pub mod keyword;
pub mod vector;

pub use embedding::{
    tokenize, EmbeddingError, EmbeddingProvider, HashedEmbeddingProvider, HttpEmbeddingProvider,
    UnavailableEmbeddingProvider,
};
pub use keyword::KeywordIndex;
pub use vector::{VectorIndex, VectorMatch};
