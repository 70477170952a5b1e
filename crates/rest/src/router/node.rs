use std::fmt;

/// One segment of a route pattern.
///
/// Two segments are equal only when they are of the same kind with the same text, so a literal
/// and a capture can live side by side under one parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Matches a path segment with exactly this text.
    Literal(String),
    /// Matches any single non-empty path segment and captures it under this name.
    Named(String),
}

impl Segment {
    /// Classifies a raw pattern segment: `{name}` is a capture, anything else is a literal.
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')) {
            Some(name) => Segment::Named(name.to_owned()),
            None => Segment::Literal(raw.to_owned()),
        }
    }

    #[inline]
    pub fn is_literal(&self) -> bool {
        matches!(self, Segment::Literal(_))
    }

    /// Checks a single path segment against this pattern segment.
    #[inline]
    pub fn accepts(&self, segment: &str) -> bool {
        match self {
            Segment::Literal(text) => text == segment,
            Segment::Named(_) => !segment.is_empty(),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Literal(text) => f.write_str(text),
            Segment::Named(name) => write!(f, "{{{name}}}"),
        }
    }
}

/// A node of a [`RouteTrie`](super::RouteTrie).
///
/// Children are kept in insertion order; a node carries a value only if some pattern ends at it.
#[derive(Debug)]
pub struct RouteNode<T> {
    segment: Segment,
    children: Vec<RouteNode<T>>,
    value: Option<T>,
}

impl<T> RouteNode<T> {
    pub(crate) fn root() -> Self {
        Self::new(Segment::Literal(String::new()))
    }

    fn new(segment: Segment) -> Self {
        Self { segment, children: Vec::new(), value: None }
    }

    /// Builds the chain `head -> rest[0] -> ... -> rest[n]` with `value` bound at its tail.
    fn chain(head: &Segment, rest: &[Segment], value: T) -> Self {
        let mut node = Self::new(head.clone());
        match rest.split_first() {
            Some((next, tail)) => node.children.push(Self::chain(next, tail, value)),
            None => node.value = Some(value),
        }
        node
    }

    /// Inserts `value` under the remaining `segments`, merging with existing equal children.
    ///
    /// Gives the value back if a value is already bound at the target node.
    pub(crate) fn insert(&mut self, segments: &[Segment], value: T) -> Result<(), T> {
        let Some((head, rest)) = segments.split_first() else {
            if self.value.is_some() {
                return Err(value);
            }
            self.value = Some(value);
            return Ok(());
        };

        match self.children.iter_mut().find(|child| child.segment == *head) {
            Some(child) => child.insert(rest, value),
            None => {
                self.children.push(Self::chain(head, rest, value));
                Ok(())
            }
        }
    }

    /// Resolves the remaining path `segments` below this node.
    ///
    /// Literal children are tried before captures; a failed branch drops the captures it pushed.
    pub(crate) fn find<'n, 'p>(
        &'n self,
        segments: &[&'p str],
        captures: &mut Vec<(&'n str, &'p str)>,
    ) -> Option<&'n T> {
        let Some((head, rest)) = segments.split_first() else {
            return self.value.as_ref();
        };

        let literals = self.children.iter().filter(|child| child.segment.is_literal());
        let captures_last = self.children.iter().filter(|child| !child.segment.is_literal());

        for child in literals.chain(captures_last) {
            if !child.segment.accepts(head) {
                continue;
            }

            let mark = captures.len();
            if let Segment::Named(name) = &child.segment {
                captures.push((name.as_str(), *head));
            }

            if let Some(value) = child.find(rest, captures) {
                return Some(value);
            }

            captures.truncate(mark);
        }

        None
    }

    #[inline]
    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    #[inline]
    pub fn children(&self) -> &[RouteNode<T>] {
        &self.children
    }

    #[inline]
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Finds the direct child holding an equal segment.
    pub fn child(&self, segment: &Segment) -> Option<&RouteNode<T>> {
        self.children.iter().find(|child| child.segment == *segment)
    }
}
