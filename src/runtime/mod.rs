// Copyright 2025 The Drasi Authors.
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

pub mod base;
mod gate;
mod traits;


pub use base::{
    RuntimeBase, RuntimeBaseParams, ENV_FUNCTION_DESCRIPTION, ENV_FUNCTION_HANDLER,
    ENV_FUNCTION_NAME, ENV_FUNCTION_VERSION, ENV_HANDLER,
};
pub use gate::{EventGate, EventPermit};
pub use traits::Runtime;
