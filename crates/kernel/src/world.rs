use glam::Vec2;
use mage_common::{Identity, Position, SessionId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::accounts::Accounts;
use crate::config::WorldConfig;
use crate::error::WorldError;
use crate::index::ObjectIndex;
use crate::map::{Map, ObjectState};
use crate::object::{Body, GameObject, ObjectKind, UpdateCtx};
use crate::protocol::{
    ChatRequest, Credentials, EditRequest, IdentifyRequest, MoveRequest, RegisterRequest,
    ServerEvent, Transport,
};
use crate::queue::TaskQueue;
use crate::rng::SplitMix64;
use crate::session::SessionRegistry;

/// A deferred world mutation, run on the tick thread before objects update.
pub type Event = Box<dyn FnOnce(&mut World) -> Result<(), WorldError> + Send>;

/// A deferred action run once the tick has fully settled. Posts see the
/// world read-only; they exist to push outbound messages.
pub type Post = Box<dyn FnOnce(&World) -> Result<(), WorldError> + Send>;

/// Thread-safe ingress into a [`World`].
///
/// Network threads hold one of these and never the world itself. Every
/// method only appends to a queue and returns immediately.
#[derive(Clone)]
pub struct WorldHandle {
    events: Arc<TaskQueue<Event>>,
    posts: Arc<TaskQueue<Post>>,
}

impl WorldHandle {
    /// Queue a mutation for the next tick.
    pub fn enqueue_event<F>(&self, event: F)
    where
        F: FnOnce(&mut World) -> Result<(), WorldError> + Send + 'static,
    {
        self.events.push(Box::new(event));
    }

    /// Queue an action to run after the next tick settles.
    pub fn enqueue_post<F>(&self, post: F)
    where
        F: FnOnce(&World) -> Result<(), WorldError> + Send + 'static,
    {
        self.posts.push(Box::new(post));
    }

    /// A session opened. Nothing happens until it identifies.
    pub fn connect(&self, session: SessionId) {
        tracing::debug!(%session, "session connected");
    }

    /// A session closed. Its player is parked on the next tick.
    pub fn disconnect(&self, session: SessionId) {
        self.enqueue_event(move |world| {
            world.disconnect(session);
            Ok(())
        });
    }

    /// Queue an identify request.
    pub fn identify(&self, session: SessionId, request: IdentifyRequest) {
        self.enqueue_event(move |world| world.identify(session, request));
    }

    /// Queue a move request.
    pub fn move_player(&self, session: SessionId, request: MoveRequest) {
        self.enqueue_event(move |world| world.move_player(session, request));
    }

    /// Queue an edit request.
    pub fn edit(&self, session: SessionId, request: EditRequest) {
        self.enqueue_event(move |world| world.edit(session, request));
    }

    /// Queue a chat line.
    pub fn chat(&self, session: SessionId, request: ChatRequest) {
        self.enqueue_event(move |world| world.chat(session, request));
    }

    /// Queue a login registration.
    pub fn register(&self, session: SessionId, request: RegisterRequest) {
        self.enqueue_event(move |world| world.register(session, request));
    }
}

/// The authoritative world state.
///
/// Owns the object index, the maps and the session registry. Only whoever
/// owns the `World` (the tick thread) can mutate it; everyone else goes
/// through a [`WorldHandle`]. Each [`update`](Self::update) runs queued
/// events, then every object's behavior, then queued posts.
pub struct World {
    config: WorldConfig,
    index: ObjectIndex,
    maps: BTreeMap<Identity, Map>,
    starting_map: Identity,
    sessions: SessionRegistry,
    /// Players known to the world but not currently in it, kept for resume.
    parked: HashMap<Identity, GameObject>,
    accounts: Box<dyn Accounts>,
    transport: Arc<dyn Transport>,
    events: Arc<TaskQueue<Event>>,
    posts: Arc<TaskQueue<Post>>,
    rng: SplitMix64,
    tick: u64,
}

impl World {
    /// Create a world with one empty starting map.
    pub fn new(
        config: WorldConfig,
        accounts: impl Accounts + 'static,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let starting_map = Identity::random();
        let mut maps = BTreeMap::new();
        maps.insert(starting_map.clone(), Map::new(starting_map.clone()));
        let rng = SplitMix64::new(config.seed);
        Self {
            config,
            index: ObjectIndex::new(),
            maps,
            starting_map,
            sessions: SessionRegistry::new(),
            parked: HashMap::new(),
            accounts: Box::new(accounts),
            transport,
            events: Arc::new(TaskQueue::new()),
            posts: Arc::new(TaskQueue::new()),
            rng,
            tick: 0,
        }
    }

    /// A cloneable handle for other threads.
    pub fn handle(&self) -> WorldHandle {
        WorldHandle {
            events: Arc::clone(&self.events),
            posts: Arc::clone(&self.posts),
        }
    }

    /// Queue a mutation for the next tick. Safe to call from inside an event.
    pub fn enqueue_event<F>(&self, event: F)
    where
        F: FnOnce(&mut World) -> Result<(), WorldError> + Send + 'static,
    {
        self.events.push(Box::new(event));
    }

    /// Queue an action to run after object updates. Safe to call from inside a post.
    pub fn enqueue_post<F>(&self, post: F)
    where
        F: FnOnce(&World) -> Result<(), WorldError> + Send + 'static,
    {
        self.posts.push(Box::new(post));
    }

    /// Number of completed ticks.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// The configuration the world was built with.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Every object currently in the world.
    pub fn index(&self) -> &ObjectIndex {
        &self.index
    }

    /// Map that new and resumed players join.
    pub fn starting_map(&self) -> &Identity {
        &self.starting_map
    }

    /// Look up a map.
    pub fn map(&self, id: &Identity) -> Option<&Map> {
        self.maps.get(id)
    }

    /// Current session bindings.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// The account store.
    pub fn accounts(&self) -> &dyn Accounts {
        self.accounts.as_ref()
    }

    /// The player bound to `session`, if it is in the world.
    pub fn player_for(&self, session: SessionId) -> Option<&GameObject> {
        self.sessions
            .player_for(session)
            .and_then(|id| self.index.get(id))
    }

    /// A player that has left the world and is waiting to be resumed.
    pub fn parked_player(&self, id: &Identity) -> Option<&GameObject> {
        self.parked.get(id)
    }

    /// Add another empty map and return its identity.
    pub fn add_map(&mut self) -> Identity {
        let id = Identity::random();
        self.maps.insert(id.clone(), Map::new(id.clone()));
        id
    }

    /// Run one tick: drain events, update every object, drain posts.
    ///
    /// Anything enqueued while this runs waits for the next call. A failing
    /// or panicking thunk is logged and the rest of its queue still runs.
    pub fn update(&mut self) {
        let _span = tracing::debug_span!("tick", tick = self.tick).entered();

        let events = self.events.take();
        let event_count = events.len();
        for event in events {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| event(self)));
            report("event", outcome);
        }

        self.advance_objects();

        let posts = self.posts.take();
        let post_count = posts.len();
        for post in posts {
            let world: &World = self;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| post(world)));
            report("post", outcome);
        }

        tracing::trace!(event_count, post_count, objects = self.index.len(), "tick done");
        self.tick += 1;
    }

    fn advance_objects(&mut self) {
        let mut ctx = UpdateCtx {
            rng: &mut self.rng,
            butterfly: &self.config.butterfly,
        };
        let departed = self.index.update_all(&mut ctx);
        for mut obj in departed {
            self.detach(&mut obj);
            tracing::debug!(id = %obj.id(), kind = %obj.kind(), "object left the world");
        }
    }

    /// Allocate a new object of `kind` with a fresh identity. The object is
    /// not placed; hand it to [`join`](Self::join) for that.
    pub fn create(&mut self, kind: ObjectKind) -> GameObject {
        GameObject::new(Identity::random(), Body::for_kind(kind))
    }

    /// Like [`create`](Self::create) for a type named on the wire. Unknown
    /// names and players are refused with a log line.
    pub fn create_from_type(&mut self, name: &str) -> Option<GameObject> {
        let kind = match name.parse::<ObjectKind>() {
            Ok(ObjectKind::Player) => {
                let err = WorldError::NotSpawnable(name.to_owned());
                tracing::warn!(%err, "object creation refused");
                return None;
            }
            Ok(kind) => kind,
            Err(err) => {
                tracing::warn!(%err, "object creation failed");
                return None;
            }
        };
        Some(self.create(kind))
    }

    /// Place `obj` on `map` at `pos` and register it in the index.
    pub fn join(
        &mut self,
        mut obj: GameObject,
        map: &Identity,
        pos: Position,
    ) -> Result<Identity, WorldError> {
        if self.index.contains(obj.id()) {
            return Err(WorldError::DuplicateIdentity(obj.id().clone()));
        }
        let target = self
            .maps
            .get_mut(map)
            .ok_or_else(|| WorldError::MapNotFound(map.clone()))?;
        if !target.place(&mut obj, pos) {
            return Err(WorldError::AlreadyPlaced(obj.id().clone()));
        }
        let id = obj.id().clone();
        self.index.add(obj);
        Ok(id)
    }

    /// Take an object out of the world and hand it back unplaced.
    pub fn leave(&mut self, id: &Identity) -> Option<GameObject> {
        let mut obj = self.index.remove(id)?;
        self.detach(&mut obj);
        Some(obj)
    }

    fn detach(&mut self, obj: &mut GameObject) {
        if let Some(map_id) = obj.map().cloned() {
            if let Some(map) = self.maps.get_mut(&map_id) {
                map.remove(obj);
            }
        }
        obj.set_map(None);
    }

    /// Recognise a session as a player and put that player in the world.
    pub fn identify(
        &mut self,
        session: SessionId,
        request: IdentifyRequest,
    ) -> Result<(), WorldError> {
        tracing::debug!(%session, "identify");
        let player = match request.credentials() {
            Credentials::Token(token) => match self.accounts.player_from_token(&token) {
                Some(player) => player,
                None => {
                    let player = Identity::random();
                    self.accounts.set_token_for_player(&token, &player);
                    tracing::info!(%player, "created player");
                    player
                }
            },
            Credentials::Login { username, password } => {
                match self.accounts.player_from_login(&username, &password) {
                    Some(player) => player,
                    None => {
                        tracing::info!(%session, %username, "login failed");
                        self.reply(session, ServerEvent::error("Account not found"));
                        return Ok(());
                    }
                }
            }
            Credentials::Missing => {
                self.reply(
                    session,
                    ServerEvent::error("Missing token, or username / password"),
                );
                return Ok(());
            }
        };
        self.bind(session, player)
    }

    fn bind(&mut self, session: SessionId, player: Identity) -> Result<(), WorldError> {
        // One player per session: drop whoever this session drove before.
        if self
            .sessions
            .player_for(session)
            .is_some_and(|current| *current != player)
        {
            self.disconnect(session);
        }

        // One session per player: the newest connection wins.
        if let Some(old) = self.sessions.session_for(&player).filter(|s| *s != session) {
            self.sessions.unbind(old);
            tracing::info!(%player, %old, new = %session, "closing superseded session");
            self.transport.close(old);
        }

        if let Some(obj) = self.index.get_mut(&player) {
            if let Some(p) = obj.as_player_mut() {
                p.session = Some(session);
            }
        } else {
            let mut obj = match self.parked.remove(&player) {
                Some(obj) => obj,
                None => {
                    let mut obj = GameObject::new(player.clone(), Body::for_kind(ObjectKind::Player));
                    obj.set_pos(self.config.spawn);
                    obj
                }
            };
            if let Some(p) = obj.as_player_mut() {
                p.session = Some(session);
            }
            let pos = obj.pos();
            let start = self.starting_map.clone();
            self.join(obj, &start, pos)?;
        }

        self.sessions.bind(session, player.clone());
        tracing::info!(%session, %player, "player joined");
        self.welcome(player);
        Ok(())
    }

    fn welcome(&self, player: Identity) {
        self.enqueue_post(move |world| {
            world.send_state(&player);
            Ok(())
        });
    }

    /// Send a player its map and its own state, if it still has a session.
    pub fn send_state(&self, player: &Identity) {
        let Some(obj) = self.index.get(player) else {
            return;
        };
        let Some(session) = obj.as_player().and_then(|p| p.session) else {
            return;
        };
        let Some(map) = obj.map().and_then(|m| self.maps.get(m)) else {
            return;
        };
        self.transport.send(
            session,
            ServerEvent::State {
                map: map.snapshot(&self.index),
                you: ObjectState::from(obj),
            },
        );
    }

    /// Queue a message for `session`, delivered after this tick settles.
    fn reply(&self, session: SessionId, event: ServerEvent) {
        self.enqueue_post(move |world| {
            world.transport.send(session, event);
            Ok(())
        });
    }

    /// Detach the session's player from the world. The player record is
    /// parked so a later identify can resume it.
    pub fn disconnect(&mut self, session: SessionId) {
        let Some(player) = self.sessions.unbind(session) else {
            tracing::debug!(%session, "disconnect for unbound session");
            return;
        };
        let Some(mut obj) = self.leave(&player) else {
            return;
        };
        if let Some(p) = obj.as_player_mut() {
            p.session = None;
        }
        self.parked.insert(player.clone(), obj);
        tracing::info!(%session, %player, "player left");
    }

    /// Reposition the session's player on its map.
    pub fn move_player(&mut self, session: SessionId, request: MoveRequest) -> Result<(), WorldError> {
        let Some(player) = self.sessions.player_for(session) else {
            return Ok(());
        };
        let Some(obj) = self.index.get_mut(player) else {
            return Ok(());
        };
        let Some(map) = obj.map().cloned() else {
            return Ok(());
        };
        if let Some(map) = self.maps.get(&map) {
            map.move_to(obj, Vec2::from(request.pos));
        }
        Ok(())
    }

    /// Apply an editor request on the editor's current map. Sub-operations
    /// are independent; a failing one is logged and the rest still apply.
    pub fn edit(&mut self, session: SessionId, request: EditRequest) -> Result<(), WorldError> {
        let Some(editor) = self.sessions.player_for(session) else {
            return Ok(());
        };
        let Some(map) = self.index.get(editor).and_then(|o| o.map()).cloned() else {
            return Ok(());
        };
        let tile = request.tile_edit();

        if let Some(add) = request.add_obj {
            if let Some(obj) = self.create_from_type(&add.kind) {
                match self.join(obj, &map, Vec2::from(add.pos)) {
                    Ok(id) => tracing::debug!(%id, kind = %add.kind, "edit added object"),
                    Err(err) => tracing::warn!(%err, "edit add failed"),
                }
            }
        }

        if let Some(id) = request.remove_obj {
            match self.index.get(&id).map(GameObject::kind) {
                Some(ObjectKind::Player) => tracing::warn!(%id, "edit cannot remove a player"),
                Some(_) => {
                    self.leave(&id);
                }
                None => tracing::debug!(%id, "edit remove for unknown object"),
            }
        }

        if let Some(mv) = request.move_obj {
            if let Some(obj) = self.index.get_mut(&mv.id) {
                obj.set_pos(Vec2::from(mv.pos));
            }
        }

        if let Some((pos, tile)) = tile {
            if let Some(map) = self.maps.get_mut(&map) {
                map.set_tile(pos, tile);
            }
        }
        Ok(())
    }

    /// Broadcast a chat line to every connected player on the sender's map.
    pub fn chat(&mut self, session: SessionId, request: ChatRequest) -> Result<(), WorldError> {
        let Some(from) = self.sessions.player_for(session).cloned() else {
            return Ok(());
        };
        let Some(map) = self.index.get(&from).and_then(|o| o.map()).cloned() else {
            return Ok(());
        };
        let message = request.message;
        self.enqueue_post(move |world| {
            for session in world.sessions_on_map(&map) {
                world.transport.send(
                    session,
                    ServerEvent::Chat {
                        from: from.clone(),
                        message: message.clone(),
                    },
                );
            }
            Ok(())
        });
        Ok(())
    }

    /// Attach a username and password to the session's player. A refused
    /// login is reported to the client and returned.
    pub fn register(
        &mut self,
        session: SessionId,
        request: RegisterRequest,
    ) -> Result<(), WorldError> {
        let Some(player) = self.sessions.player_for(session).cloned() else {
            self.reply(session, ServerEvent::error("Identify before registering"));
            return Ok(());
        };
        if let Err(err) = self
            .accounts
            .set_login(&request.username, &request.password, &player)
        {
            self.reply(session, ServerEvent::error(err.to_string()));
            return Err(err.into());
        }
        tracing::info!(%player, username = %request.username, "registered login");
        Ok(())
    }

    /// Sessions whose player currently stands on `map`, in session order.
    pub fn sessions_on_map(&self, map: &Identity) -> Vec<SessionId> {
        let mut out: Vec<SessionId> = self
            .sessions
            .sessions()
            .filter(|(_, player)| {
                self.index
                    .get(player)
                    .is_some_and(|obj| obj.map() == Some(map))
            })
            .map(|(session, _)| session)
            .collect();
        out.sort();
        out
    }

    /// Point-in-time counters for logs and tooling.
    pub fn summary(&self) -> WorldSummary {
        WorldSummary {
            tick: self.tick,
            objects: self.index.len(),
            maps: self.maps.len(),
            sessions: self.sessions.len(),
            parked_players: self.parked.len(),
            queued_events: self.events.len(),
            queued_posts: self.posts.len(),
        }
    }
}

fn report(kind: &str, outcome: std::thread::Result<Result<(), WorldError>>) {
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!(%err, "{kind} failed"),
        Err(_) => tracing::error!("{kind} panicked"),
    }
}

/// Summary of world state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldSummary {
    pub tick: u64,
    pub objects: usize,
    pub maps: usize,
    pub sessions: usize,
    pub parked_players: usize,
    pub queued_events: usize,
    pub queued_posts: usize,
}

impl fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "World: tick={} objects={} maps={} sessions={} parked={} queued_events={} queued_posts={}",
            self.tick,
            self.objects,
            self.maps,
            self.sessions,
            self.parked_players,
            self.queued_events,
            self.queued_posts
        )
    }
}
