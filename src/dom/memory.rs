//! In-memory [`PageDom`] used by tests.
//!
//! Selector queries render the tree to HTML, tagging every element with
//! its handle, and let `scraper` do the matching.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use scraper::{Html, Selector};

use super::selector::parse_selector;
use super::{DomError, ElementId, ElementSpec, PageDom};

/// Attribute carrying the element handle in rendered HTML.
const HANDLE_ATTR: &str = "data-memory-handle";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// An event recorded by [`MemoryDom::dispatch_event`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchedEvent {
    /// Target element.
    pub target: ElementId,
    /// Event type, e.g. `input`.
    pub kind: String,
}

#[derive(Debug)]
struct Node {
    tag: String,
    attributes: Vec<(String, String)>,
    value: String,
    text: String,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
}

impl Node {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug)]
struct Tree {
    nodes: HashMap<ElementId, Node>,
    next_id: u64,
    root: ElementId,
    head: ElementId,
    body: ElementId,
    url: String,
    events: Vec<DispatchedEvent>,
    style_sheets: Vec<String>,
    mutations: usize,
}

impl Tree {
    fn node(&self, id: ElementId) -> Result<&Node, DomError> {
        self.nodes.get(&id).ok_or(DomError::Detached(id))
    }

    fn node_mut(&mut self, id: ElementId) -> Result<&mut Node, DomError> {
        self.nodes.get_mut(&id).ok_or(DomError::Detached(id))
    }

    fn create(&mut self, spec: &ElementSpec) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        let text = spec.text.clone().unwrap_or_default();
        let (value, text) = if spec.tag == "textarea" {
            (text, String::new())
        } else {
            let value = spec
                .attributes
                .iter()
                .find(|(k, _)| k == "value")
                .map(|(_, v)| v.clone())
                .unwrap_or_default();
            (value, text)
        };
        self.nodes.insert(
            id,
            Node {
                tag: spec.tag.to_ascii_lowercase(),
                attributes: spec.attributes.clone(),
                value,
                text,
                parent: None,
                children: Vec::new(),
            },
        );
        id
    }

    fn detach(&mut self, id: ElementId) -> Result<(), DomError> {
        let parent = self.node(id)?.parent;
        if let Some(parent) = parent {
            if let Some(p) = self.nodes.get_mut(&parent) {
                p.children.retain(|c| *c != id);
            }
            self.node_mut(id)?.parent = None;
        }
        Ok(())
    }

    fn drop_subtree(&mut self, id: ElementId) {
        if let Some(node) = self.nodes.remove(&id) {
            for child in node.children {
                self.drop_subtree(child);
            }
        }
    }

    fn is_connected(&self, id: ElementId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == self.root {
                return true;
            }
            current = self.nodes.get(&c).and_then(|n| n.parent);
        }
        false
    }

    fn topmost(&self, id: ElementId) -> ElementId {
        let mut current = id;
        while let Some(parent) = self.nodes.get(&current).and_then(|n| n.parent) {
            current = parent;
        }
        current
    }

    fn render(&self, id: ElementId, out: &mut String) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        out.push_str(&format!("<{}", node.tag));
        for (name, value) in &node.attributes {
            out.push_str(&format!(" {name}=\"{}\"", escape(value)));
        }
        out.push_str(&format!(" {HANDLE_ATTR}=\"{}\">", id.0));
        if VOID_ELEMENTS.contains(&node.tag.as_str()) {
            return;
        }
        out.push_str(&escape(&node.text));
        for child in &node.children {
            self.render(*child, out);
        }
        out.push_str(&format!("</{}>", node.tag));
    }

    /// Elements under `top` matching `selector`, in document order.
    fn matching(&self, selector: &Selector, top: ElementId) -> Vec<ElementId> {
        let mut html = String::new();
        if top == self.root {
            html.push_str("<!DOCTYPE html>");
        }
        self.render(top, &mut html);
        let parsed = if top == self.root {
            Html::parse_document(&html)
        } else {
            Html::parse_fragment(&html)
        };
        parsed
            .select(selector)
            .filter_map(|element| element.value().attr(HANDLE_ATTR))
            .filter_map(|handle| handle.parse().ok())
            .map(ElementId)
            .collect()
    }

    fn text_of(&self, id: ElementId) -> Result<String, DomError> {
        let node = self.node(id)?;
        let mut text = node.text.clone();
        for child in &node.children {
            text.push_str(&self.text_of(*child)?);
        }
        Ok(text)
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// A thread-safe in-memory document.
///
/// Starts with `html > (head, body)`. Mutations made through [`PageDom`]
/// are counted so tests can assert that nothing was written; the builder
/// helpers ([`append`](Self::append), [`set_url`](Self::set_url)) are not
/// counted.
#[derive(Debug)]
pub struct MemoryDom {
    inner: Mutex<Tree>,
}

impl MemoryDom {
    /// Creates an empty document at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        let mut tree = Tree {
            nodes: HashMap::new(),
            next_id: 1,
            root: ElementId(0),
            head: ElementId(0),
            body: ElementId(0),
            url: url.into(),
            events: Vec::new(),
            style_sheets: Vec::new(),
            mutations: 0,
        };
        let root = tree.create(&ElementSpec::new("html"));
        let head = tree.create(&ElementSpec::new("head"));
        let body = tree.create(&ElementSpec::new("body"));
        for child in [head, body] {
            if let Some(n) = tree.nodes.get_mut(&child) {
                n.parent = Some(root);
            }
        }
        if let Some(n) = tree.nodes.get_mut(&root) {
            n.children = vec![head, body];
        }
        tree.root = root;
        tree.head = head;
        tree.body = body;
        Self {
            inner: Mutex::new(tree),
        }
    }

    fn tree(&self) -> MutexGuard<'_, Tree> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Tree) -> Result<T, DomError>,
    ) -> Result<T, DomError> {
        let mut tree = self.tree();
        let out = f(&mut tree)?;
        tree.mutations += 1;
        Ok(out)
    }

    /// The `<body>` element.
    pub fn body(&self) -> ElementId {
        self.tree().body
    }

    /// The `<head>` element.
    pub fn head(&self) -> ElementId {
        self.tree().head
    }

    /// Builds a child of `parent` without counting a mutation.
    ///
    /// If `parent` does not exist the element is created detached.
    pub fn append(&self, parent: ElementId, spec: ElementSpec) -> ElementId {
        let mut tree = self.tree();
        let id = tree.create(&spec);
        if let Some(p) = tree.nodes.get_mut(&parent) {
            p.children.push(id);
            if let Some(n) = tree.nodes.get_mut(&id) {
                n.parent = Some(parent);
            }
        }
        id
    }

    /// Simulates a client-side navigation.
    pub fn set_url(&self, url: impl Into<String>) {
        self.tree().url = url.into();
    }

    /// Number of writes made through [`PageDom`].
    pub fn mutation_count(&self) -> usize {
        self.tree().mutations
    }

    /// Events dispatched so far.
    pub fn events(&self) -> Vec<DispatchedEvent> {
        self.tree().events.clone()
    }

    /// Stylesheet ids registered so far.
    pub fn style_sheets(&self) -> Vec<String> {
        self.tree().style_sheets.clone()
    }

    /// Number of elements matching `selector` (0 for invalid selectors).
    pub fn count(&self, selector: &str) -> usize {
        self.query_all(selector).map(|v| v.len()).unwrap_or(0)
    }
}

impl PageDom for MemoryDom {
    fn current_url(&self) -> String {
        self.tree().url.clone()
    }

    fn query_all(&self, selector: &str) -> Result<Vec<ElementId>, DomError> {
        let parsed = parse_selector(selector)?;
        let tree = self.tree();
        Ok(tree.matching(&parsed, tree.root))
    }

    fn closest(&self, element: ElementId, selector: &str) -> Result<Option<ElementId>, DomError> {
        let parsed = parse_selector(selector)?;
        let tree = self.tree();
        tree.node(element)?;
        let matches: HashSet<ElementId> =
            tree.matching(&parsed, tree.topmost(element)).into_iter().collect();
        let mut current = Some(element);
        while let Some(id) = current {
            if matches.contains(&id) {
                return Ok(Some(id));
            }
            current = tree.nodes.get(&id).and_then(|n| n.parent);
        }
        Ok(None)
    }

    fn parent(&self, element: ElementId) -> Result<Option<ElementId>, DomError> {
        Ok(self.tree().node(element)?.parent)
    }

    fn children(&self, element: ElementId) -> Result<Vec<ElementId>, DomError> {
        Ok(self.tree().node(element)?.children.clone())
    }

    fn is_connected(&self, element: ElementId) -> bool {
        self.tree().is_connected(element)
    }

    fn tag_name(&self, element: ElementId) -> Result<String, DomError> {
        Ok(self.tree().node(element)?.tag.clone())
    }

    fn attribute(&self, element: ElementId, name: &str) -> Result<Option<String>, DomError> {
        Ok(self.tree().node(element)?.attr(name).map(str::to_string))
    }

    fn set_attribute(&self, element: ElementId, name: &str, value: &str) -> Result<(), DomError> {
        self.mutate(|tree| {
            let node = tree.node_mut(element)?;
            match node.attributes.iter_mut().find(|(k, _)| k == name) {
                Some((_, v)) => *v = value.to_string(),
                None => node.attributes.push((name.to_string(), value.to_string())),
            }
            Ok(())
        })
    }

    fn is_content_editable(&self, element: ElementId) -> Result<bool, DomError> {
        let tree = self.tree();
        tree.node(element)?;
        let mut current = Some(element);
        while let Some(id) = current {
            let node = tree.node(id)?;
            if let Some(flag) = node.attr("contenteditable") {
                return Ok(matches!(flag, "" | "true" | "plaintext-only"));
            }
            current = node.parent;
        }
        Ok(false)
    }

    fn value(&self, element: ElementId) -> Result<String, DomError> {
        let tree = self.tree();
        let node = tree.node(element)?;
        match node.tag.as_str() {
            "textarea" | "input" => Ok(node.value.clone()),
            "select" => {
                let options: Vec<&Node> = node
                    .children
                    .iter()
                    .filter_map(|c| tree.nodes.get(c))
                    .filter(|n| n.tag == "option")
                    .collect();
                let chosen = options
                    .iter()
                    .find(|n| n.attr("selected").is_some())
                    .or_else(|| options.first());
                Ok(chosen
                    .map(|n| n.attr("value").unwrap_or(&n.text).to_string())
                    .unwrap_or_default())
            }
            other => Err(DomError::Unsupported(format!("<{other}> has no value"))),
        }
    }

    fn set_value(&self, element: ElementId, value: &str) -> Result<(), DomError> {
        self.mutate(|tree| {
            let node = tree.node_mut(element)?;
            match node.tag.as_str() {
                "textarea" | "input" => {
                    node.value = value.to_string();
                    Ok(())
                }
                other => Err(DomError::Unsupported(format!("<{other}> has no value"))),
            }
        })
    }

    fn text_content(&self, element: ElementId) -> Result<String, DomError> {
        self.tree().text_of(element)
    }

    fn set_text_content(&self, element: ElementId, text: &str) -> Result<(), DomError> {
        self.mutate(|tree| {
            let children = std::mem::take(&mut tree.node_mut(element)?.children);
            for child in children {
                tree.drop_subtree(child);
            }
            tree.node_mut(element)?.text = text.to_string();
            Ok(())
        })
    }

    fn dispatch_event(&self, element: ElementId, event: &str) -> Result<(), DomError> {
        let mut tree = self.tree();
        tree.node(element)?;
        tree.events.push(DispatchedEvent {
            target: element,
            kind: event.to_string(),
        });
        Ok(())
    }

    fn create_element(&self, spec: &ElementSpec) -> Result<ElementId, DomError> {
        Ok(self.tree().create(spec))
    }

    fn append_child(&self, parent: ElementId, child: ElementId) -> Result<(), DomError> {
        self.mutate(|tree| {
            tree.node(parent)?;
            tree.detach(child)?;
            tree.node_mut(parent)?.children.push(child);
            tree.node_mut(child)?.parent = Some(parent);
            Ok(())
        })
    }

    fn replace_child(
        &self,
        parent: ElementId,
        new: ElementId,
        old: ElementId,
    ) -> Result<(), DomError> {
        self.mutate(|tree| {
            tree.node(new)?;
            let position = tree
                .node(parent)?
                .children
                .iter()
                .position(|c| *c == old)
                .ok_or_else(|| DomError::Unsupported("node to replace is not a child".into()))?;
            tree.detach(new)?;
            tree.node_mut(parent)?.children[position] = new;
            tree.node_mut(new)?.parent = Some(parent);
            tree.drop_subtree(old);
            Ok(())
        })
    }

    fn remove(&self, element: ElementId) -> Result<(), DomError> {
        self.mutate(|tree| {
            tree.detach(element)?;
            tree.drop_subtree(element);
            Ok(())
        })
    }

    fn add_style_sheet(&self, id: &str, _css: &str) -> Result<(), DomError> {
        self.mutate(|tree| {
            if !tree.style_sheets.iter().any(|s| s == id) {
                tree.style_sheets.push(id.to_string());
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat_page() -> (MemoryDom, ElementId, ElementId) {
        let dom = MemoryDom::new("https://chatgpt.com/c/1");
        let container = dom.append(
            dom.body(),
            ElementSpec::new("div").attr("data-testid", "chat-input-container"),
        );
        let wrapper = dom.append(container, ElementSpec::new("div").class("wrap"));
        let input = dom.append(
            wrapper,
            ElementSpec::new("textarea").attr("id", "prompt-textarea").text("hello"),
        );
        (dom, container, input)
    }

    #[test]
    fn query_and_closest() {
        let (dom, container, input) = chat_page();
        assert_eq!(dom.query_first("#prompt-textarea").unwrap(), Some(input));
        assert_eq!(
            dom.closest(input, r#"div[data-testid="chat-input-container"]"#)
                .unwrap(),
            Some(container)
        );
        assert_eq!(dom.query_all("body div textarea").unwrap(), vec![input]);
        assert!(dom.query_all("span textarea").unwrap().is_empty());
        assert!(dom.closest(input, "section").unwrap().is_none());
    }

    #[test]
    fn invalid_selector_is_an_error() {
        let (dom, _, input) = chat_page();
        assert!(matches!(dom.query_all("div["), Err(DomError::InvalidSelector(_))));
        assert!(dom.closest(input, "").is_err());
        assert_eq!(dom.count("div["), 0);
    }

    #[test]
    fn quoted_attribute_values_survive_rendering() {
        let dom = MemoryDom::new("https://chatgpt.com/");
        let tricky = dom.append(
            dom.body(),
            ElementSpec::new("div").attr("data-label", r#"say "hi" & <go>"#),
        );
        assert_eq!(
            dom.query_all(r#"div[data-label='say "hi" & <go>']"#).unwrap(),
            vec![tricky]
        );
    }

    #[test]
    fn closest_inside_detached_subtree() {
        let dom = MemoryDom::new("https://chatgpt.com/");
        let group = dom
            .create_element(&ElementSpec::new("div").class("group"))
            .unwrap();
        let button = dom.create_element(&ElementSpec::new("button")).unwrap();
        dom.append_child(group, button).unwrap();
        assert_eq!(dom.closest(button, ".group").unwrap(), Some(group));
        assert!(dom.query_all(".group").unwrap().is_empty());
    }

    #[test]
    fn textarea_value_comes_from_initial_text() {
        let (dom, _, input) = chat_page();
        assert_eq!(dom.value(input).unwrap(), "hello");
        dom.set_value(input, "bye").unwrap();
        assert_eq!(dom.value(input).unwrap(), "bye");
        assert_eq!(dom.mutation_count(), 1);
    }

    #[test]
    fn remove_detaches_subtree() {
        let (dom, container, input) = chat_page();
        dom.remove(container).unwrap();
        assert!(!dom.is_connected(input));
        assert_eq!(dom.value(input), Err(DomError::Detached(input)));
        assert_eq!(dom.count("textarea"), 0);
    }

    #[test]
    fn contenteditable_is_inherited() {
        let dom = MemoryDom::new("https://claude.ai/");
        let editor = dom.append(dom.body(), ElementSpec::new("div").attr("contenteditable", "true"));
        let paragraph = dom.append(editor, ElementSpec::new("p").text("draft"));
        assert!(dom.is_content_editable(paragraph).unwrap());
        assert_eq!(dom.text_content(editor).unwrap(), "draft");

        dom.set_text_content(editor, "new").unwrap();
        assert_eq!(dom.text_content(editor).unwrap(), "new");
        assert!(dom.children(editor).unwrap().is_empty());
    }

    #[test]
    fn select_value_uses_selected_option() {
        let dom = MemoryDom::new("https://chatgpt.com/");
        let select = dom.append(dom.body(), ElementSpec::new("select"));
        dom.append(select, ElementSpec::new("option").attr("value", "a"));
        dom.append(select, ElementSpec::new("option").attr("value", "b").attr("selected", ""));
        assert_eq!(dom.value(select).unwrap(), "b");
    }

    #[test]
    fn replace_child_swaps_in_place() {
        let dom = MemoryDom::new("https://chatgpt.com/");
        let parent = dom.append(dom.body(), ElementSpec::new("div"));
        let first = dom.append(parent, ElementSpec::new("span").class("one"));
        let last = dom.append(parent, ElementSpec::new("span").class("two"));
        let fresh = dom.create_element(&ElementSpec::new("b")).unwrap();
        dom.replace_child(parent, fresh, first).unwrap();
        assert_eq!(dom.children(parent).unwrap(), vec![fresh, last]);
        assert!(!dom.is_connected(first));
    }

    #[test]
    fn events_are_recorded_without_counting_writes() {
        let (dom, _, input) = chat_page();
        dom.dispatch_event(input, "input").unwrap();
        assert_eq!(dom.events()[0].kind, "input");
        assert_eq!(dom.mutation_count(), 0);
    }
}
