//! KubeEventSource - core/v1 Event watch as an `EventSource`

use std::collections::HashSet;

use contracts::{EventSource, Notification};
use futures::stream::BoxStream;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Event;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client};
use tracing::{debug, info, warn};

use crate::convert::to_cluster_event;

type WatchStream = BoxStream<'static, Result<watcher::Event<Event>, watcher::Error>>;

/// Watches Event objects and translates watcher events into notifications
///
/// The first completed initial list yields `Notification::Synced`; later
/// relists are silent. Watch errors are logged and retried with the
/// watcher's default backoff.
pub struct KubeEventSource {
    stream: WatchStream,
    /// UIDs currently present, to tell `Added` from `Updated`
    known: HashSet<String>,
    /// UIDs seen by the list in progress; replaces `known` on `InitDone`
    relist: Option<HashSet<String>>,
    synced: bool,
}

impl KubeEventSource {
    /// Watch events in all namespaces
    pub fn all(client: Client) -> Self {
        Self::from_api(Api::all(client))
    }

    /// Watch events in one namespace
    pub fn namespaced(client: Client, namespace: &str) -> Self {
        Self::from_api(Api::namespaced(client, namespace))
    }

    fn from_api(api: Api<Event>) -> Self {
        let stream = watcher(api, watcher::Config::default())
            .default_backoff()
            .boxed();
        Self::from_stream(stream)
    }

    pub(crate) fn from_stream(stream: WatchStream) -> Self {
        Self {
            stream,
            known: HashSet::new(),
            relist: None,
            synced: false,
        }
    }

    fn translate(&mut self, event: watcher::Event<Event>) -> Option<Notification> {
        match event {
            watcher::Event::Init => {
                debug!("Event list started");
                self.relist = Some(HashSet::new());
                None
            }
            watcher::Event::InitApply(obj) => {
                let event = to_cluster_event(&obj);
                let seen = self.relist.get_or_insert_with(HashSet::new);
                let first = seen.insert(event.uid.clone()) && !self.known.contains(&event.uid);
                Some(if first {
                    Notification::Added(event)
                } else {
                    Notification::Updated(event)
                })
            }
            watcher::Event::Apply(obj) => {
                let event = to_cluster_event(&obj);
                if self.known.insert(event.uid.clone()) {
                    Some(Notification::Added(event))
                } else {
                    Some(Notification::Updated(event))
                }
            }
            watcher::Event::Delete(obj) => {
                let event = to_cluster_event(&obj);
                self.known.remove(&event.uid);
                Some(Notification::Deleted(event))
            }
            watcher::Event::InitDone => {
                // objects deleted while disconnected get no Delete event
                if let Some(listed) = self.relist.take() {
                    self.known = listed;
                }
                if self.synced {
                    debug!(known = self.known.len(), "Event relist complete");
                    None
                } else {
                    self.synced = true;
                    info!(known = self.known.len(), "Event list synced");
                    Some(Notification::Synced)
                }
            }
        }
    }
}

impl EventSource for KubeEventSource {
    async fn next(&mut self) -> Option<Notification> {
        loop {
            match self.stream.next().await? {
                Ok(event) => {
                    if let Some(notification) = self.translate(event) {
                        return Some(notification);
                    }
                }
                Err(e) => warn!(error = %e, "Event watch failed, retrying"),
            }
        }
    }
}
