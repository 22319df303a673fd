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

//! Runtime variants.
//!
//! - [`InProcessRuntime`]: handlers compiled into the processor and registered as closures
//! - [`ShellRuntime`]: one command execution per event
//! - [`SubprocessRuntime`]: a long-lived wrapper process for interpreted languages
//!
//! [`RuntimeRegistry`] picks the variant named by `spec.runtime`.

pub mod in_process;
mod registry;
pub mod shell;
pub mod subprocess;

pub use in_process::{
    Handler, HandlerFuture, HandlerRegistry, InProcessRuntime, IN_PROCESS_RUNTIME_KIND,
};
pub use registry::{RuntimeFactory, RuntimeRegistry};
pub use shell::{ShellRuntime, ARGUMENTS_HEADER, SHELL_RUNTIME_KIND};
pub use subprocess::{SubprocessRuntime, SUBPROCESS_RUNTIME_KIND};
