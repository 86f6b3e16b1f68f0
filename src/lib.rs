/*! glshare is the bookkeeping core of a GL interception layer.

An overlay injected into a host application sits between the host and its GL
driver. It needs to know what the host is drawing, which means it needs its own
view of the host's contexts and objects: which buffers exist and what's in them,
how vertex attributes are laid out, which program and textures are bound. This
crate keeps that view. It never talks to a driver; the shim that intercepts the
real entrypoints calls in here and forwards to the driver itself.

# Overview

| Piece                    | Module                  | What it tracks                                            |
|--------------------------|-------------------------|-----------------------------------------------------------|
| Contexts                 | [`context`]             | Object tables and binding points for one GL context       |
| Registry                 | [`registry`]            | Every live context and which one each thread has current  |
| Object tables            | [`resources`]           | id → record maps, shared across a sharing group           |
| Attribute codec          | [`attribute`]           | Vertex layouts, and decoding vertices back out of buffers |
| Buffer mapping           | [`mapping`]             | `glMapBufferRange` emulated over a staging allocation     |
| Matrices                 | [`matrix`]              | Column-major transforms for intercepted positions         |
| Entrypoints              | [`entrypoints`]         | Driver-shaped results for each intercepted call           |

# Sharing groups

GL lets a context share its objects with another. Here the sharing is explicit:
a context is either an owner, with its own tables, or a dependent referencing
exactly one owner's tables. Tables count their referencing contexts and are
freed with the last one, so destroying contexts in any order never frees
storage another context still uses.

# Threads

Every call is synchronous. Each thread has at most one current context, and a
context is current on at most one thread. Two contexts that don't share tables
never contend on a lock.

```
use glshare::config::{BufferMapping, Config};
use glshare::registry::{ContextRegistry, ThreadHandle};

let registry = ContextRegistry::new(Config::new(BufferMapping::Emulated));
let owner = registry.create_context(None).unwrap();
let dependent = registry.create_context(Some(owner)).unwrap();
registry.make_current(Some(dependent), ThreadHandle::current()).unwrap();

// objects created through one context are visible through the other
registry.context(owner).unwrap().create_buffer(1).unwrap();
let current = registry.require_current(ThreadHandle::current()).unwrap();
assert!(current.buffer(1).is_ok());
```
*/

pub mod error;
pub mod gl_enums;
pub mod config;
pub mod resources;
pub mod attribute;
pub mod mapping;
pub mod context;
pub mod registry;
pub mod matrix;
pub mod entrypoints;

pub use error::{Error, ObjectKind, Result};
pub use config::{BufferMapping, Config};
pub use context::{Context, ContextId};
pub use registry::{ContextRegistry, ThreadHandle};
pub use entrypoints::Interceptor;
pub use vectormatrix;
