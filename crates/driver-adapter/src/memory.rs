//! In-memory element tree implementing [`Driver`].
//!
//! Backs every engine test and lets callers rehearse flows without a browser. The tree
//! reproduces the failure modes the engine exists for: overlays that intercept native
//! clicks, handles that go stale on re-render, and UI reactions that land after a delay
//! measured on the tokio clock.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::trace;
use uiresolve_core_types::NodeHandle;

use crate::driver::{ClickMode, Driver, Key};
use crate::error::{DriverError, DriverErrorKind};
use crate::selector::{ElementTree, SelectorList};

/// Callback run against the tree when an interaction or timer fires.
pub type DomHandler = Arc<dyn Fn(&mut MemoryDom, &NodeHandle) + Send + Sync>;

const HANDLE_PREFIX: &str = "mem-";

/// Declarative element description used to build fixtures.
#[derive(Debug, Clone)]
pub struct El {
    tag: String,
    attrs: BTreeMap<String, String>,
    text: String,
    visible: bool,
    children: Vec<El>,
}

impl El {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            text: String::new(),
            visible: true,
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn id(self, id: &str) -> Self {
        self.attr("id", id)
    }

    pub fn class(mut self, class: &str) -> Self {
        let merged = match self.attrs.get("class") {
            Some(existing) if !existing.is_empty() => format!("{} {}", existing, class),
            _ => class.to_string(),
        };
        self.attrs.insert("class".to_string(), merged);
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(self) -> Self {
        self.attr("disabled", "")
    }

    pub fn child(mut self, child: El) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = El>) -> Self {
        self.children.extend(children);
        self
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    tag: String,
    attrs: BTreeMap<String, String>,
    text: String,
    visible: bool,
    parent: Option<usize>,
    children: Vec<usize>,
    attached: bool,
}

struct Pending {
    due: Instant,
    target: NodeHandle,
    handler: DomHandler,
}

/// Mutable element tree. Handlers receive `&mut MemoryDom`.
pub struct MemoryDom {
    nodes: Vec<NodeData>,
    click_handlers: HashMap<usize, Vec<DomHandler>>,
    key_handlers: HashMap<(usize, Key), Vec<DomHandler>>,
    pending: Vec<Pending>,
    overlay: Option<usize>,
    keyboard_only: HashSet<usize>,
    query_log: Vec<String>,
    click_log: Vec<(NodeHandle, ClickMode)>,
}

impl ElementTree for MemoryDom {
    type Id = usize;

    fn tag(&self, id: usize) -> &str {
        &self.nodes[id].tag
    }

    fn attr(&self, id: usize, name: &str) -> Option<&str> {
        self.nodes[id].attrs.get(name).map(String::as_str)
    }

    fn parent(&self, id: usize) -> Option<usize> {
        self.nodes[id].parent
    }
}

impl MemoryDom {
    fn new() -> Self {
        let body = NodeData {
            tag: "body".to_string(),
            attrs: BTreeMap::new(),
            text: String::new(),
            visible: true,
            parent: None,
            children: Vec::new(),
            attached: true,
        };
        Self {
            nodes: vec![body],
            click_handlers: HashMap::new(),
            key_handlers: HashMap::new(),
            pending: Vec::new(),
            overlay: None,
            keyboard_only: HashSet::new(),
            query_log: Vec::new(),
            click_log: Vec::new(),
        }
    }

    fn handle_of(id: usize) -> NodeHandle {
        NodeHandle::new(format!("{}{}", HANDLE_PREFIX, id))
    }

    /// Resolves a handle to a live node id.
    fn live(&self, handle: &NodeHandle) -> Result<usize, DriverError> {
        let id = handle
            .as_str()
            .strip_prefix(HANDLE_PREFIX)
            .and_then(|raw| raw.parse::<usize>().ok())
            .ok_or_else(|| {
                DriverError::new(DriverErrorKind::Internal)
                    .with_hint(format!("foreign handle {}", handle))
            })?;
        match self.nodes.get(id) {
            Some(node) if node.attached => Ok(id),
            _ => Err(DriverError::stale(handle)),
        }
    }

    pub fn root(&self) -> NodeHandle {
        Self::handle_of(0)
    }

    /// Appends `el` (and its children) as the last child of `parent`.
    pub fn append(&mut self, parent: &NodeHandle, el: El) -> Result<NodeHandle, DriverError> {
        let parent_id = self.live(parent)?;
        let id = self.build(parent_id, el);
        self.nodes[parent_id].children.push(id);
        Ok(Self::handle_of(id))
    }

    /// Inserts `el` directly after `sibling`.
    pub fn insert_after(
        &mut self,
        sibling: &NodeHandle,
        el: El,
    ) -> Result<NodeHandle, DriverError> {
        let sibling_id = self.live(sibling)?;
        let parent_id = self.nodes[sibling_id].parent.ok_or_else(|| {
            DriverError::new(DriverErrorKind::Internal).with_hint("cannot insert after root")
        })?;
        let id = self.build(parent_id, el);
        let children = &mut self.nodes[parent_id].children;
        let pos = children
            .iter()
            .position(|child| *child == sibling_id)
            .map(|p| p + 1)
            .unwrap_or(children.len());
        children.insert(pos, id);
        Ok(Self::handle_of(id))
    }

    fn build(&mut self, parent: usize, el: El) -> usize {
        let id = self.nodes.len();
        self.nodes.push(NodeData {
            tag: el.tag,
            attrs: el.attrs,
            text: el.text,
            visible: el.visible,
            parent: Some(parent),
            children: Vec::new(),
            attached: true,
        });
        for child in el.children {
            let child_id = self.build(id, child);
            self.nodes[id].children.push(child_id);
        }
        id
    }

    /// Detaches a subtree. Handles into it go stale.
    pub fn remove(&mut self, handle: &NodeHandle) -> Result<(), DriverError> {
        let id = self.live(handle)?;
        if let Some(parent) = self.nodes[id].parent {
            self.nodes[parent].children.retain(|child| *child != id);
        }
        self.detach(id);
        Ok(())
    }

    fn detach(&mut self, id: usize) {
        self.nodes[id].attached = false;
        self.click_handlers.remove(&id);
        self.key_handlers.retain(|(node, _), _| *node != id);
        if self.overlay == Some(id) {
            self.overlay = None;
        }
        let children = self.nodes[id].children.clone();
        for child in children {
            self.detach(child);
        }
    }

    /// Re-renders a node: the old subtree is detached and an identical copy takes its place.
    pub fn rerender(&mut self, handle: &NodeHandle) -> Result<NodeHandle, DriverError> {
        let id = self.live(handle)?;
        let el = self.snapshot(id);
        let replacement = self.insert_after(handle, el)?;
        self.remove(handle)?;
        Ok(replacement)
    }

    fn snapshot(&self, id: usize) -> El {
        let node = &self.nodes[id];
        El {
            tag: node.tag.clone(),
            attrs: node.attrs.clone(),
            text: node.text.clone(),
            visible: node.visible,
            children: node
                .children
                .iter()
                .map(|child| self.snapshot(*child))
                .collect(),
        }
    }

    pub fn set_attr(&mut self, handle: &NodeHandle, name: &str, value: &str) -> Result<(), DriverError> {
        let id = self.live(handle)?;
        self.nodes[id]
            .attrs
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    pub fn remove_attr(&mut self, handle: &NodeHandle, name: &str) -> Result<(), DriverError> {
        let id = self.live(handle)?;
        self.nodes[id].attrs.remove(name);
        Ok(())
    }

    pub fn get_attr(&self, handle: &NodeHandle, name: &str) -> Option<String> {
        let id = self.live(handle).ok()?;
        self.nodes[id].attrs.get(name).cloned()
    }

    pub fn toggle_class(&mut self, handle: &NodeHandle, class: &str) -> Result<bool, DriverError> {
        let id = self.live(handle)?;
        let current = self.nodes[id].attrs.get("class").cloned().unwrap_or_default();
        let mut classes: Vec<&str> = current.split_whitespace().collect();
        let present = classes.contains(&class);
        if present {
            classes.retain(|c| *c != class);
        } else {
            classes.push(class);
        }
        let joined = classes.join(" ");
        self.nodes[id].attrs.insert("class".to_string(), joined);
        Ok(!present)
    }

    pub fn set_text(&mut self, handle: &NodeHandle, text: &str) -> Result<(), DriverError> {
        let id = self.live(handle)?;
        self.nodes[id].text = text.to_string();
        Ok(())
    }

    pub fn set_visible(&mut self, handle: &NodeHandle, visible: bool) -> Result<(), DriverError> {
        let id = self.live(handle)?;
        self.nodes[id].visible = visible;
        Ok(())
    }

    /// While set (and visible), native clicks outside this subtree are intercepted.
    pub fn set_overlay(&mut self, handle: Option<&NodeHandle>) -> Result<(), DriverError> {
        self.overlay = match handle {
            Some(handle) => Some(self.live(handle)?),
            None => None,
        };
        Ok(())
    }

    /// Every click on the node fails as not interactable; key presses still reach it.
    pub fn set_keyboard_only(&mut self, handle: &NodeHandle) -> Result<(), DriverError> {
        let id = self.live(handle)?;
        self.keyboard_only.insert(id);
        Ok(())
    }

    pub fn on_click(&mut self, handle: &NodeHandle, handler: DomHandler) -> Result<(), DriverError> {
        let id = self.live(handle)?;
        self.click_handlers.entry(id).or_default().push(handler);
        Ok(())
    }

    pub fn on_key(
        &mut self,
        handle: &NodeHandle,
        key: Key,
        handler: DomHandler,
    ) -> Result<(), DriverError> {
        let id = self.live(handle)?;
        self.key_handlers.entry((id, key)).or_default().push(handler);
        Ok(())
    }

    /// Runs `handler` once `delay` has elapsed on the tokio clock.
    pub fn schedule(&mut self, delay: Duration, target: &NodeHandle, handler: DomHandler) {
        self.pending.push(Pending {
            due: Instant::now() + delay,
            target: target.clone(),
            handler,
        });
    }

    /// Nodes matching `selector` in document order, without logging the query.
    pub fn find(&self, selector: &str) -> Result<Vec<NodeHandle>, DriverError> {
        let parsed = SelectorList::parse(selector)?;
        let mut out = Vec::new();
        self.collect(0, &parsed, &mut out);
        Ok(out.into_iter().map(Self::handle_of).collect())
    }

    pub fn first(&self, selector: &str) -> Option<NodeHandle> {
        self.find(selector).ok().and_then(|found| found.into_iter().next())
    }

    fn collect(&self, id: usize, selector: &SelectorList, out: &mut Vec<usize>) {
        for child in &self.nodes[id].children {
            if selector.matches(self, *child) {
                out.push(*child);
            }
            self.collect(*child, selector, out);
        }
    }

    fn is_ancestor_or_self(&self, ancestor: usize, mut node: usize) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.nodes[node].parent {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    fn visible_id(&self, id: usize) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if !self.nodes[current].visible {
                return false;
            }
            cursor = self.nodes[current].parent;
        }
        true
    }

    fn enabled_id(&self, id: usize) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let attrs = &self.nodes[current].attrs;
            if attrs.contains_key("disabled") || attrs.get("aria-disabled").map(String::as_str) == Some("true") {
                return false;
            }
            cursor = self.nodes[current].parent;
        }
        true
    }

    fn text_content(&self, id: usize, out: &mut String) {
        let node = &self.nodes[id];
        if !node.text.is_empty() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&node.text);
        }
        for child in &node.children {
            self.text_content(*child, out);
        }
    }

    fn fire_click(&mut self, id: usize) {
        // Handlers on the node and its ancestors, innermost first (bubbling).
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            chain.push(current);
            cursor = self.nodes[current].parent;
        }
        let target = Self::handle_of(id);
        for node in chain {
            let handlers = self.click_handlers.get(&node).cloned().unwrap_or_default();
            for handler in handlers {
                handler(self, &target);
            }
        }
    }

    fn fire_key(&mut self, id: usize, key: Key) -> bool {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            chain.push(current);
            cursor = self.nodes[current].parent;
        }
        let target = Self::handle_of(id);
        let mut handled = false;
        for node in chain {
            let handlers = self
                .key_handlers
                .get(&(node, key))
                .cloned()
                .unwrap_or_default();
            for handler in handlers {
                handled = true;
                handler(self, &target);
            }
        }
        handled
    }

    fn activates_on_key(&self, id: usize, key: Key) -> bool {
        let node = &self.nodes[id];
        let role = node.attrs.get("role").map(String::as_str).unwrap_or("");
        let clickable = matches!(node.tag.as_str(), "button" | "a")
            || matches!(role, "button" | "checkbox" | "menuitem" | "option" | "tab");
        let is_checkbox = node.tag == "input"
            && node.attrs.get("type").map(String::as_str) == Some("checkbox");
        match key {
            Key::Enter => clickable,
            Key::Space => clickable || is_checkbox,
            _ => false,
        }
    }

    /// Applies every deferred mutation that has come due.
    fn settle(&mut self) {
        let now = Instant::now();
        loop {
            let Some(pos) = self.pending.iter().position(|p| p.due <= now) else {
                break;
            };
            let pending = self.pending.remove(pos);
            trace!(target = %pending.target, "applying deferred mutation");
            (pending.handler)(self, &pending.target);
        }
    }
}

/// [`Driver`] over a [`MemoryDom`].
#[derive(Clone)]
pub struct MemoryDriver {
    dom: Arc<Mutex<MemoryDom>>,
}

impl Default for MemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self {
            dom: Arc::new(Mutex::new(MemoryDom::new())),
        }
    }

    /// Runs `f` with exclusive access to the tree.
    pub fn with_dom<R>(&self, f: impl FnOnce(&mut MemoryDom) -> R) -> R {
        let mut dom = self.dom.lock();
        f(&mut dom)
    }

    pub fn root(&self) -> NodeHandle {
        self.dom.lock().root()
    }

    /// Appends a fixture subtree.
    ///
    /// # Panics
    ///
    /// When `parent` is stale. Fixture setup only; use [`MemoryDom::append`] where a stale
    /// parent is an expected case.
    pub fn mount(&self, parent: &NodeHandle, el: El) -> NodeHandle {
        self.with_dom(|dom| dom.append(parent, el))
            .expect("fixture parent must be attached")
    }

    pub fn first(&self, selector: &str) -> Option<NodeHandle> {
        self.with_dom(|dom| {
            dom.settle();
            dom.first(selector)
        })
    }

    pub fn find(&self, selector: &str) -> Vec<NodeHandle> {
        self.with_dom(|dom| {
            dom.settle();
            dom.find(selector).unwrap_or_default()
        })
    }

    /// Registers a click handler while building a fixture.
    ///
    /// # Panics
    ///
    /// When `handle` is stale; [`MemoryDom::on_click`] returns the error instead.
    pub fn on_click<F>(&self, handle: &NodeHandle, handler: F)
    where
        F: Fn(&mut MemoryDom, &NodeHandle) + Send + Sync + 'static,
    {
        self.with_dom(|dom| dom.on_click(handle, Arc::new(handler)))
            .expect("click handler target must be attached");
    }

    /// Registers a key handler while building a fixture.
    ///
    /// # Panics
    ///
    /// When `handle` is stale; [`MemoryDom::on_key`] returns the error instead.
    pub fn on_key<F>(&self, handle: &NodeHandle, key: Key, handler: F)
    where
        F: Fn(&mut MemoryDom, &NodeHandle) + Send + Sync + 'static,
    {
        self.with_dom(|dom| dom.on_key(handle, key, Arc::new(handler)))
            .expect("key handler target must be attached");
    }

    /// Selectors passed to `query`/`query_within`, oldest first.
    pub fn queries(&self) -> Vec<String> {
        self.dom.lock().query_log.clone()
    }

    pub fn clicks(&self) -> Vec<(NodeHandle, ClickMode)> {
        self.dom.lock().click_log.clone()
    }

    pub fn clear_logs(&self) {
        let mut dom = self.dom.lock();
        dom.query_log.clear();
        dom.click_log.clear();
    }

    fn read<R>(
        &self,
        node: &NodeHandle,
        f: impl FnOnce(&MemoryDom, usize) -> R,
    ) -> Result<R, DriverError> {
        let mut dom = self.dom.lock();
        dom.settle();
        let id = dom.live(node)?;
        Ok(f(&dom, id))
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn query(&self, selector: &str) -> Result<Vec<NodeHandle>, DriverError> {
        let mut dom = self.dom.lock();
        dom.settle();
        dom.query_log.push(selector.to_string());
        dom.find(selector)
    }

    async fn query_within(
        &self,
        root: &NodeHandle,
        selector: &str,
    ) -> Result<Vec<NodeHandle>, DriverError> {
        let mut dom = self.dom.lock();
        dom.settle();
        dom.query_log.push(selector.to_string());
        let root_id = dom.live(root)?;
        let parsed = SelectorList::parse(selector)?;
        let mut out = Vec::new();
        dom.collect(root_id, &parsed, &mut out);
        Ok(out.into_iter().map(MemoryDom::handle_of).collect())
    }

    async fn contains(
        &self,
        ancestor: &NodeHandle,
        node: &NodeHandle,
    ) -> Result<bool, DriverError> {
        let mut dom = self.dom.lock();
        dom.settle();
        let ancestor_id = dom.live(ancestor)?;
        let node_id = dom.live(node)?;
        Ok(dom.is_ancestor_or_self(ancestor_id, node_id))
    }

    async fn next_sibling(&self, node: &NodeHandle) -> Result<Option<NodeHandle>, DriverError> {
        self.read(node, |dom, id| {
            let parent = dom.nodes[id].parent?;
            let siblings = &dom.nodes[parent].children;
            let pos = siblings.iter().position(|child| *child == id)?;
            siblings.get(pos + 1).copied().map(MemoryDom::handle_of)
        })
    }

    async fn is_visible(&self, node: &NodeHandle) -> Result<bool, DriverError> {
        self.read(node, |dom, id| dom.visible_id(id))
    }

    async fn is_enabled(&self, node: &NodeHandle) -> Result<bool, DriverError> {
        self.read(node, |dom, id| dom.enabled_id(id))
    }

    async fn click(&self, node: &NodeHandle, mode: ClickMode) -> Result<(), DriverError> {
        let mut dom = self.dom.lock();
        dom.settle();
        let id = dom.live(node)?;
        if dom.keyboard_only.contains(&id) {
            return Err(DriverError::new(DriverErrorKind::NotInteractable)
                .with_hint(format!("{} ignores pointer clicks", node)));
        }
        if mode == ClickMode::Native {
            if !dom.visible_id(id) {
                return Err(DriverError::new(DriverErrorKind::NotInteractable)
                    .with_hint(format!("{} is not visible", node)));
            }
            if let Some(overlay) = dom.overlay {
                if dom.nodes[overlay].attached
                    && dom.visible_id(overlay)
                    && !dom.is_ancestor_or_self(overlay, id)
                {
                    let blocker = dom.nodes[overlay].tag.clone();
                    return Err(DriverError::intercepted(format!(
                        "element {} would receive the click",
                        blocker
                    )));
                }
            }
        }
        if !dom.enabled_id(id) {
            // Disabled controls swallow clicks without reacting.
            dom.click_log.push((node.clone(), mode));
            return Ok(());
        }
        dom.click_log.push((node.clone(), mode));
        dom.fire_click(id);
        Ok(())
    }

    async fn type_text(&self, node: &NodeHandle, text: &str) -> Result<(), DriverError> {
        let mut dom = self.dom.lock();
        dom.settle();
        let id = dom.live(node)?;
        if !dom.visible_id(id) || !dom.enabled_id(id) {
            return Err(DriverError::new(DriverErrorKind::NotInteractable)
                .with_hint(format!("{} cannot take input", node)));
        }
        let current = dom.nodes[id].attrs.get("value").cloned().unwrap_or_default();
        dom.nodes[id]
            .attrs
            .insert("value".to_string(), format!("{}{}", current, text));
        Ok(())
    }

    async fn select_option(&self, node: &NodeHandle, value: &str) -> Result<(), DriverError> {
        let mut dom = self.dom.lock();
        dom.settle();
        let id = dom.live(node)?;
        if dom.nodes[id].tag != "select" {
            return Err(DriverError::new(DriverErrorKind::NotInteractable)
                .with_hint(format!("{} is not a <select>", node)));
        }
        let options = dom.find("option")?;
        let mut chosen = None;
        for option in options {
            let option_id = dom.live(&option)?;
            if !dom.is_ancestor_or_self(id, option_id) {
                continue;
            }
            let mut label = String::new();
            dom.text_content(option_id, &mut label);
            let option_value = dom.nodes[option_id].attrs.get("value").cloned();
            if option_value.as_deref() == Some(value) || label.trim() == value {
                chosen = Some(option_value.unwrap_or_else(|| label.trim().to_string()));
                break;
            }
        }
        let chosen = chosen.ok_or_else(|| {
            DriverError::new(DriverErrorKind::NotInteractable)
                .with_hint(format!("option '{}' not found", value))
        })?;
        dom.nodes[id].attrs.insert("value".to_string(), chosen);
        dom.fire_click(id);
        Ok(())
    }

    async fn press_key(&self, node: &NodeHandle, key: Key) -> Result<(), DriverError> {
        let mut dom = self.dom.lock();
        dom.settle();
        let id = dom.live(node)?;
        let handled = dom.fire_key(id, key);
        if !handled && dom.activates_on_key(id, key) && dom.enabled_id(id) {
            dom.fire_click(id);
        }
        Ok(())
    }

    async fn scroll_into_view(&self, node: &NodeHandle) -> Result<(), DriverError> {
        self.read(node, |_, _| ())
    }

    async fn attribute(
        &self,
        node: &NodeHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        self.read(node, |dom, id| dom.nodes[id].attrs.get(name).cloned())
    }

    async fn text(&self, node: &NodeHandle) -> Result<Option<String>, DriverError> {
        self.read(node, |dom, id| {
            let mut out = String::new();
            dom.text_content(id, &mut out);
            Some(out)
        })
    }
}
