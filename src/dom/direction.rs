use crate::dom::element::{BoundingBox, NodeId};
use crate::dom::page::Page;
use crate::dom::point::{ElementPredicate, PointOptions, select_at_point};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Default probe budget for [`search_direction`], in pixels
pub const DEFAULT_MAX_DISTANCE: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn is_vertical(&self) -> bool {
        matches!(self, Direction::Up | Direction::Down)
    }

    /// Direction for a keyboard `key` value (`ArrowUp`, `ArrowDown`, ...)
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ArrowUp" => Some(Direction::Up),
            "ArrowDown" => Some(Direction::Down),
            "ArrowLeft" => Some(Direction::Left),
            "ArrowRight" => Some(Direction::Right),
            _ => None,
        }
    }
}

/// Routes arrow key presses to per-direction handlers
#[derive(Default)]
pub struct ArrowKeys<'a> {
    handlers: HashMap<Direction, Box<dyn FnMut(Direction) + 'a>>,
}

impl<'a> ArrowKeys<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `direction`, replacing any earlier one
    pub fn on(mut self, direction: Direction, handler: impl FnMut(Direction) + 'a) -> Self {
        self.handlers.insert(direction, Box::new(handler));
        self
    }

    /// Run the handler bound to `key`. Returns whether one ran.
    pub fn handle(&mut self, key: &str) -> bool {
        let Some(direction) = Direction::from_key(key) else {
            return false;
        };
        match self.handlers.get_mut(&direction) {
            Some(handler) => {
                handler(direction);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for ArrowKeys<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrowKeys")
            .field("bound", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        };
        f.write_str(name)
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            other => Err(format!("Unknown direction '{}'", other)),
        }
    }
}

/// Options shared by [`search_direction`] and [`find_element_below`]
#[derive(Clone, Copy)]
pub struct SearchOptions<'a> {
    /// Probes leaving the viewport (or context box) re-enter from the opposite edge
    pub wrap_around: bool,
    pub max_distance: f64,
    pub context: Option<NodeId>,
    pub predicate: Option<ElementPredicate<'a>>,
}

impl Default for SearchOptions<'_> {
    fn default() -> Self {
        Self {
            wrap_around: false,
            max_distance: DEFAULT_MAX_DISTANCE,
            context: None,
            predicate: None,
        }
    }
}

impl<'a> SearchOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with no distance limit, as used by [`find_element_below`]
    pub fn unbounded() -> Self {
        Self {
            max_distance: f64::INFINITY,
            ..Self::default()
        }
    }

    pub fn wrap_around(mut self, wrap_around: bool) -> Self {
        self.wrap_around = wrap_around;
        self
    }

    pub fn max_distance(mut self, max_distance: f64) -> Self {
        self.max_distance = max_distance;
        self
    }

    pub fn within(mut self, context: NodeId) -> Self {
        self.context = Some(context);
        self
    }

    pub fn matching(mut self, predicate: ElementPredicate<'a>) -> Self {
        self.predicate = Some(predicate);
        self
    }

    fn point_options(&self) -> PointOptions<'a> {
        PointOptions {
            context: self.context,
            predicate: self.predicate,
        }
    }
}

impl fmt::Debug for SearchOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchOptions")
            .field("wrap_around", &self.wrap_around)
            .field("max_distance", &self.max_distance)
            .field("context", &self.context)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

/// Probe outward from `element` in `direction` and return the first element hit.
///
/// Probes start 1px past the edge, on the line through the element's midpoint,
/// and advance by half the element's size along the probe axis. The search ends
/// at `max_distance`, when a probe leaves the viewport (or context box), or,
/// with wrap-around, once the probes have covered that box once.
pub fn search_direction<P: Page + ?Sized>(
    page: &P,
    element: NodeId,
    direction: Direction,
    options: &SearchOptions<'_>,
) -> Result<Option<NodeId>> {
    let rect = page.bounding_box(element)?;
    let bounds = search_bounds(page, options)?;
    let (half, span) = if direction.is_vertical() {
        (rect.height / 2.0, bounds.height)
    } else {
        (rect.width / 2.0, bounds.width)
    };
    let step = half.max(1.0);
    let limit = if options.wrap_around {
        options.max_distance.min(span + 1.0)
    } else {
        options.max_distance
    };
    let point_options = options.point_options();

    let mut distance = 1.0;
    while distance < limit {
        let (mut x, mut y) = probe_point(&rect, direction, distance);
        if options.wrap_around {
            if direction.is_vertical() {
                y = wrap(y, bounds.top(), bounds.bottom());
            } else {
                x = wrap(x, bounds.left(), bounds.right());
            }
        } else if !within_axis(&bounds, direction, x, y) {
            log::debug!("probe {} from {} left the search box", direction, element);
            break;
        }
        distance += step;

        log::debug!("probe {} from {} at ({}, {})", direction, element, x, y);
        if let Some(found) = select_at_point(page, x, y, &point_options)? {
            return Ok(Some(found));
        }
    }

    Ok(None)
}

/// Look below `element` with a doubling stride.
///
/// Probes continue while they stay inside the viewport height and under
/// `max_distance`. At least one probe is always made.
pub fn find_element_below<P: Page + ?Sized>(
    page: &P,
    element: NodeId,
    options: &SearchOptions<'_>,
) -> Result<Option<NodeId>> {
    let rect = page.bounding_box(element)?;
    let viewport = page.viewport()?;
    let bounds = options.wrap_around.then(|| search_bounds(page, options)).transpose()?;
    let point_options = options.point_options();
    let x = rect.center_x();
    let bottom = rect.bottom();

    let mut distance = 1.0;
    loop {
        let mut y = bottom + distance;
        if let Some(bounds) = &bounds {
            y = wrap(y, bounds.top(), bounds.bottom());
        }

        log::debug!("probe below {} at ({}, {})", element, x, y);
        if let Some(found) = select_at_point(page, x, y, &point_options)? {
            return Ok(Some(found));
        }

        distance *= 2.0;
        if bottom + distance >= viewport.height || distance >= options.max_distance {
            return Ok(None);
        }
    }
}

fn probe_point(rect: &BoundingBox, direction: Direction, distance: f64) -> (f64, f64) {
    match direction {
        Direction::Up => (rect.center_x(), rect.top() - distance),
        Direction::Down => (rect.center_x(), rect.bottom() + distance),
        Direction::Left => (rect.left() - distance, rect.center_y()),
        Direction::Right => (rect.right() + distance, rect.center_y()),
    }
}

/// The context box, or the viewport without a context
fn search_bounds<P: Page + ?Sized>(page: &P, options: &SearchOptions<'_>) -> Result<BoundingBox> {
    match options.context {
        Some(context) => page.bounding_box(context),
        None => Ok(page.viewport()?.as_box()),
    }
}

fn within_axis(bounds: &BoundingBox, direction: Direction, x: f64, y: f64) -> bool {
    if direction.is_vertical() {
        y >= bounds.top() && y < bounds.bottom()
    } else {
        x >= bounds.left() && x < bounds.right()
    }
}

/// Fold `coordinate` into `[low, high)`
fn wrap(coordinate: f64, low: f64, high: f64) -> f64 {
    let span = high - low;
    if span <= 0.0 || (coordinate >= low && coordinate < high) {
        return coordinate;
    }
    low + (coordinate - low).rem_euclid(span)
}
