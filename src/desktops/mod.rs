use anyhow::Result;

mod provision;
mod resolve;
pub use provision::*;
pub use resolve::*;

/// Backend identity of a live desktop. Never confused with its position in the enumeration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DesktopId(pub i64);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveDesktop {
    pub id: DesktopId,
    pub name: String,
}

/// Virtual desktop backend. Enumeration order is stable and defines live indices.
#[allow(async_fn_in_trait)]
pub trait DesktopProvider {
    async fn desktops(&self) -> Result<Vec<LiveDesktop>>;
    async fn create(&self) -> Result<()>;
    async fn switch_to(&self, desktop: &LiveDesktop) -> Result<()>;
    /// Live index of the active desktop, if it is part of the enumeration.
    async fn current(&self) -> Result<Option<usize>>;
    async fn set_name(&self, desktop: &LiveDesktop, name: &str) -> Result<()>;
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use crate::utils::with_mutex_lock;
    use anyhow::bail;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    pub struct FakeState {
        pub desktops: Vec<LiveDesktop>,
        pub current: usize,
        pub created: usize,
        pub switches: Vec<DesktopId>,
        pub renames: Vec<(DesktopId, String)>,
        pub naming_unsupported: bool,
        pub failing_switch: Option<DesktopId>,
        /// New desktops are enumerated first instead of last.
        pub insert_at_front: bool,
        next_id: i64,
    }

    #[derive(Debug, Default)]
    pub struct FakeDesktops {
        pub state: Mutex<FakeState>,
    }

    impl FakeDesktops {
        pub fn with_names(names: &[&str]) -> Self {
            let this = Self::default();
            with_mutex_lock(&this.state, |st| {
                for name in names {
                    st.next_id += 1;
                    st.desktops.push(LiveDesktop {
                        id: DesktopId(st.next_id),
                        name: (*name).into(),
                    });
                }
            });
            this
        }
        pub fn with(&self, f: impl FnOnce(&mut FakeState)) {
            with_mutex_lock(&self.state, f)
        }
        pub fn read<T>(&self, f: impl FnOnce(&FakeState) -> T) -> T {
            with_mutex_lock(&self.state, |st| f(st))
        }
    }

    impl DesktopProvider for FakeDesktops {
        async fn desktops(&self) -> Result<Vec<LiveDesktop>> {
            Ok(self.read(|st| st.desktops.clone()))
        }
        async fn create(&self) -> Result<()> {
            self.with(|st| {
                st.next_id += 1;
                st.created += 1;
                let desktop = LiveDesktop {
                    id: DesktopId(st.next_id),
                    name: st.next_id.to_string(),
                };
                if st.insert_at_front {
                    st.desktops.insert(0, desktop);
                } else {
                    st.desktops.push(desktop);
                }
            });
            Ok(())
        }
        async fn switch_to(&self, desktop: &LiveDesktop) -> Result<()> {
            with_mutex_lock(&self.state, |st| {
                if st.failing_switch == Some(desktop.id) {
                    bail!("Switch to {:?} refused", desktop.id);
                }
                let Some(pos) = st.desktops.iter().position(|d| d.id == desktop.id) else {
                    bail!("Unknown desktop {:?}", desktop.id);
                };
                st.current = pos;
                st.switches.push(desktop.id);
                Ok(())
            })
        }
        async fn current(&self) -> Result<Option<usize>> {
            Ok(self.read(|st| (st.current < st.desktops.len()).then_some(st.current)))
        }
        async fn set_name(&self, desktop: &LiveDesktop, name: &str) -> Result<()> {
            with_mutex_lock(&self.state, |st| {
                if st.naming_unsupported {
                    bail!("Desktop names are not supported");
                }
                if let Some(live) = st.desktops.iter_mut().find(|d| d.id == desktop.id) {
                    live.name = name.into();
                }
                st.renames.push((desktop.id, name.into()));
                Ok(())
            })
        }
    }
}
