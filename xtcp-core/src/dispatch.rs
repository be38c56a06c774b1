//! Event dispatcher.
//!
//! Each connection keeps an [`EventQueue`]; at most one of its events is
//! outstanding at a time. Each client keeps a FIFO of connections (and link
//! events) in the order they became deliverable, so a connection with a
//! fresh event is never starved behind a slow one.

use crate::protocol::{ClientId, ConnId, EventKind, LinkEvent};
use std::collections::{HashMap, HashSet, VecDeque};

/// Per-connection event queue.
///
/// Terminal events supersede everything queued or awaited except an
/// undelivered `NewConnection`; nothing is accepted after one. A due poll is kept as a flag and only surfaces when
/// no other event is queued.
#[derive(Debug, Default)]
pub struct EventQueue {
    queued: VecDeque<EventKind>,
    awaiting: Option<EventKind>,
    poll_due: bool,
    terminal: bool,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event. Returns `false` if it was dropped because a terminal
    /// event is already queued.
    pub fn push(&mut self, kind: EventKind) -> bool {
        if self.terminal {
            return false;
        }
        if kind.is_terminal() {
            let unannounced = self.queued.front() == Some(&EventKind::NewConnection);
            self.queued.clear();
            if unannounced {
                self.queued.push_back(EventKind::NewConnection);
            }
            self.awaiting = None;
            self.poll_due = false;
            self.terminal = true;
        }
        self.queued.push_back(kind);
        true
    }

    /// Mark a poll as due. Polls coalesce.
    pub fn poll(&mut self) {
        if !self.terminal {
            self.poll_due = true;
        }
    }

    pub fn clear_poll(&mut self) {
        self.poll_due = false;
    }

    /// Event that the next delivery would hand out
    pub fn next_deliverable(&self) -> Option<EventKind> {
        if self.awaiting.is_some() {
            return None;
        }
        match self.queued.front() {
            Some(kind) => Some(*kind),
            None if self.poll_due => Some(EventKind::Poll),
            None => None,
        }
    }

    /// Hand out the next event. Events that need a reaction hold the
    /// connection until [`EventQueue::resolve`].
    pub fn deliver(&mut self) -> Option<EventKind> {
        let kind = self.next_deliverable()?;
        if kind == EventKind::Poll {
            self.poll_due = false;
        } else {
            self.queued.pop_front();
        }
        if kind.awaits_reaction() {
            self.awaiting = Some(kind);
        }
        Some(kind)
    }

    /// Delivered event still waiting for the client's reaction
    pub fn awaiting(&self) -> Option<EventKind> {
        self.awaiting
    }

    /// The client reacted to the awaited event
    pub fn resolve(&mut self) -> Option<EventKind> {
        self.awaiting.take()
    }

    /// The single event the client has not yet acted on
    pub fn pending(&self) -> Option<EventKind> {
        self.awaiting
            .or_else(|| self.queued.front().copied())
            .or(self.poll_due.then_some(EventKind::Poll))
    }

    /// A terminal event has been queued
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }
}

/// Entry in a client's ready FIFO
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ready {
    Connection(ConnId),
    Link(LinkEvent),
}

#[derive(Debug, Default)]
struct ClientQueue {
    ready: VecDeque<Ready>,
    scheduled: HashSet<ConnId>,
}

/// Per-client ready order
#[derive(Debug, Default)]
pub struct Dispatcher {
    clients: HashMap<ClientId, ClientQueue>,
    next_client: ClientId,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client endpoint
    pub fn attach(&mut self) -> ClientId {
        let id = self.next_client;
        self.next_client = self.next_client.wrapping_add(1);
        self.clients.insert(id, ClientQueue::default());
        id
    }

    pub fn detach(&mut self, client: ClientId) -> bool {
        self.clients.remove(&client).is_some()
    }

    pub fn is_attached(&self, client: ClientId) -> bool {
        self.clients.contains_key(&client)
    }

    pub fn clients(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.clients.keys().copied()
    }

    /// Note that `id` has a deliverable event for `client`. A connection
    /// appears at most once in the FIFO.
    pub fn schedule(&mut self, client: ClientId, id: ConnId) {
        if let Some(queue) = self.clients.get_mut(&client) {
            if queue.scheduled.insert(id) {
                queue.ready.push_back(Ready::Connection(id));
            }
        }
    }

    /// Queue a link event for every attached client
    pub fn broadcast(&mut self, event: LinkEvent) {
        for queue in self.clients.values_mut() {
            queue.ready.push_back(Ready::Link(event));
        }
    }

    /// Take the oldest ready entry of `client`
    pub fn pop(&mut self, client: ClientId) -> Option<Ready> {
        let queue = self.clients.get_mut(&client)?;
        let entry = queue.ready.pop_front()?;
        if let Ready::Connection(id) = entry {
            queue.scheduled.remove(&id);
        }
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_outstanding_event() {
        let mut queue = EventQueue::new();
        queue.push(EventKind::RecvData);
        queue.push(EventKind::SentData);

        assert_eq!(queue.deliver(), Some(EventKind::RecvData));
        assert_eq!(queue.next_deliverable(), None);
        assert_eq!(queue.pending(), Some(EventKind::RecvData));

        queue.resolve();
        assert_eq!(queue.deliver(), Some(EventKind::SentData));
    }

    #[test]
    fn test_terminal_supersedes_queued_and_awaited() {
        let mut queue = EventQueue::new();
        queue.push(EventKind::RequestData);
        queue.deliver();
        queue.push(EventKind::RecvData);
        queue.poll();

        queue.push(EventKind::Aborted);
        assert_eq!(queue.awaiting(), None);
        assert_eq!(queue.deliver(), Some(EventKind::Aborted));
        assert!(!queue.push(EventKind::RecvData));
        assert!(!queue.push(EventKind::Closed));
        assert_eq!(queue.deliver(), None);
    }

    #[test]
    fn test_terminal_keeps_unannounced_connection() {
        let mut queue = EventQueue::new();
        queue.push(EventKind::NewConnection);
        queue.push(EventKind::RecvData);
        queue.push(EventKind::TimedOut);

        assert_eq!(queue.deliver(), Some(EventKind::NewConnection));
        assert_eq!(queue.deliver(), Some(EventKind::TimedOut));
        assert_eq!(queue.deliver(), None);
    }

    #[test]
    fn test_poll_is_lowest_priority() {
        let mut queue = EventQueue::new();
        queue.poll();
        queue.push(EventKind::RecvData);

        assert_eq!(queue.deliver(), Some(EventKind::RecvData));
        queue.resolve();
        assert_eq!(queue.deliver(), Some(EventKind::Poll));
        assert_eq!(queue.awaiting(), None);
        assert_eq!(queue.deliver(), None);
    }

    #[test]
    fn test_ready_fifo_is_fair_and_deduplicated() {
        let mut dispatcher = Dispatcher::new();
        let client = dispatcher.attach();

        dispatcher.schedule(client, 3);
        dispatcher.schedule(client, 1);
        dispatcher.schedule(client, 3);
        dispatcher.broadcast(LinkEvent::Down);

        assert_eq!(dispatcher.pop(client), Some(Ready::Connection(3)));
        dispatcher.schedule(client, 3);
        assert_eq!(dispatcher.pop(client), Some(Ready::Connection(1)));
        assert_eq!(dispatcher.pop(client), Some(Ready::Link(LinkEvent::Down)));
        assert_eq!(dispatcher.pop(client), Some(Ready::Connection(3)));
        assert_eq!(dispatcher.pop(client), None);
    }

    #[test]
    fn test_detached_client_gets_nothing() {
        let mut dispatcher = Dispatcher::new();
        let client = dispatcher.attach();
        dispatcher.detach(client);
        dispatcher.schedule(client, 0);
        assert_eq!(dispatcher.pop(client), None);
    }
}
