//! # Registry
//!
//! A type-keyed singleton container. Beans are stored per type in
//! registration order, either as ready values or as factories that run
//! lazily, at most once, on first resolution (or eagerly on `refresh`).
//!
//! Values are retrieved by clone, so beans are normally `Arc`s: two lookups
//! of the same bean hand out pointers to the same instance.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use tracing::{debug, info, warn};

use crate::error::RegistryError;

type AnyBean = Box<dyn Any + Send + Sync>;
type Factory = Box<dyn FnOnce(&Registry) -> Result<AnyBean, RegistryError> + Send>;
type CloseHook = Box<dyn FnOnce() + Send>;

enum Slot {
    Ready(AnyBean),
    Pending(Factory),
    /// A factory is running on the given thread.
    Creating(ThreadId),
    Failed(RegistryError),
}

struct BeanEntry {
    name: String,
    type_name: &'static str,
    slot: Slot,
}

#[derive(Default)]
struct Beans {
    by_type: HashMap<TypeId, Vec<BeanEntry>>,
    close_hooks: Vec<CloseHook>,
}

/// The shared container holding singleton beans for the process lifetime.
///
/// Cloning a `Registry` yields another handle to the same beans.
#[derive(Clone, Default)]
pub struct Registry {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    beans: Mutex<Beans>,
    /// Signalled whenever a factory finishes or the registry is closed.
    settled: Condvar,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let beans = self.lock();
        let names: Vec<&str> = beans
            .by_type
            .values()
            .flat_map(|entries| entries.iter().map(|e| e.name.as_str()))
            .collect();
        f.debug_struct("Registry").field("beans", &names).finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Beans> {
        // A panicking factory never runs under the lock, so the map stays consistent.
        self.shared.beans.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn wait<'a>(&self, beans: MutexGuard<'a, Beans>) -> MutexGuard<'a, Beans> {
        self.shared
            .settled
            .wait(beans)
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, type_id: TypeId, entry: BeanEntry) {
        debug!(bean = %entry.name, bean_type = entry.type_name, "registering bean");
        self.lock().by_type.entry(type_id).or_default().push(entry);
    }

    /// Registers a ready instance.
    pub fn register<T>(&self, name: &str, bean: T)
    where
        T: Clone + Send + Sync + 'static,
    {
        self.push(
            TypeId::of::<T>(),
            BeanEntry {
                name: name.to_string(),
                type_name: type_name::<T>(),
                slot: Slot::Ready(Box::new(bean)),
            },
        );
    }

    /// Registers a factory that runs on first resolution.
    ///
    /// The factory receives the registry so it can look up its own
    /// dependencies. The lock is not held while it runs.
    pub fn register_factory<T, F>(&self, name: &str, factory: F)
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(&Registry) -> Result<T, RegistryError> + Send + 'static,
    {
        let erased: Factory = Box::new(move |registry| {
            factory(registry).map(|bean| Box::new(bean) as AnyBean)
        });
        self.push(
            TypeId::of::<T>(),
            BeanEntry {
                name: name.to_string(),
                type_name: type_name::<T>(),
                slot: Slot::Pending(erased),
            },
        );
    }

    /// Registers `factory` only when no bean of type `T` exists yet, ready or
    /// pending. Returns whether the factory was registered.
    pub fn register_if_absent<T, F>(&self, name: &str, factory: F) -> bool
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(&Registry) -> Result<T, RegistryError> + Send + 'static,
    {
        if self.contains::<T>() {
            debug!(bean = name, bean_type = type_name::<T>(), "existing bean wins, skipping");
            return false;
        }
        self.register_factory(name, factory);
        true
    }

    /// Runs `hook` when the registry is closed. Hooks run in reverse order.
    pub fn on_close<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.lock().close_hooks.push(Box::new(hook));
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.count::<T>() > 0
    }

    pub fn count<T: 'static>(&self) -> usize {
        self.lock()
            .by_type
            .get(&TypeId::of::<T>())
            .map_or(0, Vec::len)
    }

    /// Names of the beans of type `T`, in registration order.
    pub fn names_for<T: 'static>(&self) -> Vec<String> {
        self.lock()
            .by_type
            .get(&TypeId::of::<T>())
            .map(|entries| entries.iter().map(|e| e.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Resolves the single bean of type `T`.
    ///
    /// # Errors
    /// `NoSuchBean` when none is registered, `NotUnique` when several are,
    /// `Creation` when its factory failed.
    pub fn get<T>(&self) -> Result<T, RegistryError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let names = self.names_for::<T>();
        match names.len() {
            0 => Err(RegistryError::NoSuchBean(type_name::<T>().to_string())),
            1 => self.resolve::<T>(0),
            count => Err(RegistryError::NotUnique {
                type_name: type_name::<T>().to_string(),
                count,
                names,
            }),
        }
    }

    /// Resolves the bean of type `T` registered under `name`.
    pub fn get_by_name<T>(&self, name: &str) -> Result<T, RegistryError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let idx = self
            .names_for::<T>()
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| RegistryError::NoSuchBean(format!("{} '{}'", type_name::<T>(), name)))?;
        self.resolve::<T>(idx)
    }

    /// Resolves the bean of type `T` if exactly one is registered.
    ///
    /// Absence, or ambiguity, is not an error and yields `None`.
    pub fn get_if_unique<T>(&self) -> Result<Option<T>, RegistryError>
    where
        T: Clone + Send + Sync + 'static,
    {
        if self.count::<T>() == 1 {
            self.resolve::<T>(0).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Resolves every bean of type `T` in registration order.
    pub fn get_all<T>(&self) -> Result<Vec<T>, RegistryError>
    where
        T: Clone + Send + Sync + 'static,
    {
        (0..self.count::<T>()).map(|idx| self.resolve::<T>(idx)).collect()
    }

    /// Eagerly runs every pending factory, failing on the first error.
    pub fn refresh(&self) -> Result<(), RegistryError> {
        let pending: Vec<(TypeId, usize)> = {
            let beans = self.lock();
            beans
                .by_type
                .iter()
                .flat_map(|(type_id, entries)| {
                    entries
                        .iter()
                        .enumerate()
                        .filter(|(_, e)| matches!(e.slot, Slot::Pending(_)))
                        .map(move |(idx, _)| (*type_id, idx))
                })
                .collect()
        };
        for (type_id, idx) in pending {
            self.ensure_ready(type_id, idx)?;
        }
        info!("registry refreshed");
        Ok(())
    }

    /// Runs close hooks (newest first) and drops every bean.
    pub fn close(&self) {
        let hooks = {
            let mut beans = self.lock();
            beans.by_type.clear();
            std::mem::take(&mut beans.close_hooks)
        };
        self.shared.settled.notify_all();
        for hook in hooks.into_iter().rev() {
            hook();
        }
        info!("registry closed");
    }

    fn resolve<T>(&self, idx: usize) -> Result<T, RegistryError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let type_id = TypeId::of::<T>();
        self.ensure_ready(type_id, idx)?;

        let beans = self.lock();
        let entry = beans
            .by_type
            .get(&type_id)
            .and_then(|entries| entries.get(idx))
            .ok_or_else(|| RegistryError::NoSuchBean(type_name::<T>().to_string()))?;
        match &entry.slot {
            Slot::Ready(bean) => bean
                .downcast_ref::<T>()
                .cloned()
                .ok_or_else(|| RegistryError::TypeMismatch(entry.name.clone())),
            Slot::Failed(e) => Err(e.clone()),
            _ => Err(RegistryError::CurrentlyInCreation(entry.name.clone())),
        }
    }

    /// Makes sure the bean at `idx` is no longer pending, running its factory if needed.
    ///
    /// A bean being created on another thread is waited for; the same thread
    /// asking again is a cycle and fails with `CurrentlyInCreation`.
    fn ensure_ready(&self, type_id: TypeId, idx: usize) -> Result<(), RegistryError> {
        let current = thread::current().id();
        let (name, factory) = {
            let mut beans = self.lock();
            loop {
                let entry = beans
                    .by_type
                    .get_mut(&type_id)
                    .and_then(|entries| entries.get_mut(idx))
                    .ok_or_else(|| RegistryError::NoSuchBean(format!("{:?}", type_id)))?;
                match std::mem::replace(&mut entry.slot, Slot::Creating(current)) {
                    Slot::Pending(factory) => break (entry.name.clone(), factory),
                    Slot::Creating(owner) if owner == current => {
                        entry.slot = Slot::Creating(owner);
                        return Err(RegistryError::CurrentlyInCreation(entry.name.clone()));
                    }
                    Slot::Creating(owner) => {
                        entry.slot = Slot::Creating(owner);
                        debug!(bean = %entry.name, "waiting for bean created on another thread");
                        beans = self.wait(beans);
                    }
                    Slot::Failed(e) => {
                        entry.slot = Slot::Failed(e.clone());
                        return Err(e);
                    }
                    ready => {
                        entry.slot = ready;
                        return Ok(());
                    }
                }
            }
        };

        info!(bean = %name, "creating bean");
        let outcome = factory(self);

        let mut beans = self.lock();
        let entry = beans
            .by_type
            .get_mut(&type_id)
            .and_then(|entries| entries.get_mut(idx))
            .filter(|e| e.name == name);

        let result = match outcome {
            Ok(bean) => {
                if let Some(entry) = entry {
                    entry.slot = Slot::Ready(bean);
                }
                Ok(())
            }
            Err(source) => {
                let err = RegistryError::Creation {
                    bean: name.clone(),
                    source: Box::new(source),
                };
                warn!(bean = %name, error = %err, "bean creation failed");
                if let Some(entry) = entry {
                    entry.slot = Slot::Failed(err.clone());
                }
                Err(err)
            }
        };
        drop(beans);
        self.shared.settled.notify_all();
        result
    }
}
