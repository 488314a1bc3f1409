//! Layout options and lifecycle hooks.
//!
//! Every option is either a literal or a closure evaluated against the
//! engine each time the option is read, so an option can track the
//! container width or any other engine state.

use std::fmt;
use std::sync::Arc;

use crate::error::{GridError, Result};
use crate::runtime::JustifiedGrid;

pub const DEFAULT_SPACE_BETWEEN_ELEMENTS: f64 = 1.0;
pub const DEFAULT_DESIRED_ELEMENT_HEIGHT: f64 = 200.0;

pub type Derived<T> = Arc<dyn Fn(&JustifiedGrid) -> T>;
pub type Hook = Arc<dyn Fn(&JustifiedGrid)>;

pub enum OptionValue<T> {
    Literal(T),
    Derived(Derived<T>),
}

impl<T: Clone> OptionValue<T> {
    pub fn derived<F>(f: F) -> Self
    where
        F: Fn(&JustifiedGrid) -> T + 'static,
    {
        Self::Derived(Arc::new(f))
    }

    pub fn resolve(&self, grid: &JustifiedGrid) -> T {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Derived(f) => f(grid),
        }
    }
}

impl<T> From<T> for OptionValue<T> {
    fn from(value: T) -> Self {
        Self::Literal(value)
    }
}

impl<T: Clone> Clone for OptionValue<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Literal(value) => Self::Literal(value.clone()),
            Self::Derived(f) => Self::Derived(Arc::clone(f)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for OptionValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

/// Names accepted by [`JustifiedGrid::get_option`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKey {
    SpaceBetweenElements,
    DesiredElementHeight,
    AutoFontSize,
    HideBoxOnMissingImage,
}

impl OptionKey {
    pub const ALL: [OptionKey; 4] = [
        OptionKey::SpaceBetweenElements,
        OptionKey::DesiredElementHeight,
        OptionKey::AutoFontSize,
        OptionKey::HideBoxOnMissingImage,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OptionKey::SpaceBetweenElements => "spaceBetweenElements",
            OptionKey::DesiredElementHeight => "desiredElementHeight",
            OptionKey::AutoFontSize => "autoFontSize",
            OptionKey::HideBoxOnMissingImage => "hideBoxOnMissingImage",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.name() == name)
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolvedOption {
    Number(f64),
    Flag(bool),
}

impl ResolvedOption {
    pub fn as_number(self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(value),
            Self::Flag(_) => None,
        }
    }

    pub fn as_flag(self) -> Option<bool> {
        match self {
            Self::Flag(value) => Some(value),
            Self::Number(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct GridOptions {
    pub space_between_elements: OptionValue<f64>,
    pub desired_element_height: OptionValue<f64>,
    pub auto_font_size: OptionValue<bool>,
    pub hide_box_on_missing_image: OptionValue<bool>,
    pub on_before_options_changed: Option<Hook>,
    pub on_options_changed: Option<Hook>,
    pub on_before_render: Option<Hook>,
    pub on_render: Option<Hook>,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            space_between_elements: OptionValue::Literal(DEFAULT_SPACE_BETWEEN_ELEMENTS),
            desired_element_height: OptionValue::Literal(DEFAULT_DESIRED_ELEMENT_HEIGHT),
            auto_font_size: OptionValue::Literal(false),
            hide_box_on_missing_image: OptionValue::Literal(true),
            on_before_options_changed: None,
            on_options_changed: None,
            on_before_render: None,
            on_render: None,
        }
    }
}

impl fmt::Debug for GridOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridOptions")
            .field("space_between_elements", &self.space_between_elements)
            .field("desired_element_height", &self.desired_element_height)
            .field("auto_font_size", &self.auto_font_size)
            .field("hide_box_on_missing_image", &self.hide_box_on_missing_image)
            .finish_non_exhaustive()
    }
}

impl GridOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites every field the patch sets.
    pub fn apply(&mut self, patch: OptionsPatch) {
        let OptionsPatch {
            space_between_elements,
            desired_element_height,
            auto_font_size,
            hide_box_on_missing_image,
            on_before_options_changed,
            on_options_changed,
            on_before_render,
            on_render,
        } = patch;

        if let Some(value) = space_between_elements {
            self.space_between_elements = value;
        }
        if let Some(value) = desired_element_height {
            self.desired_element_height = value;
        }
        if let Some(value) = auto_font_size {
            self.auto_font_size = value;
        }
        if let Some(value) = hide_box_on_missing_image {
            self.hide_box_on_missing_image = value;
        }
        if let Some(hook) = on_before_options_changed {
            self.on_before_options_changed = Some(hook);
        }
        if let Some(hook) = on_options_changed {
            self.on_options_changed = Some(hook);
        }
        if let Some(hook) = on_before_render {
            self.on_before_render = Some(hook);
        }
        if let Some(hook) = on_render {
            self.on_render = Some(hook);
        }
    }
}

/// Partial option update; unset fields keep their current value.
#[derive(Clone, Default)]
pub struct OptionsPatch {
    pub space_between_elements: Option<OptionValue<f64>>,
    pub desired_element_height: Option<OptionValue<f64>>,
    pub auto_font_size: Option<OptionValue<bool>>,
    pub hide_box_on_missing_image: Option<OptionValue<bool>>,
    pub on_before_options_changed: Option<Hook>,
    pub on_options_changed: Option<Hook>,
    pub on_before_render: Option<Hook>,
    pub on_render: Option<Hook>,
}

impl OptionsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn space_between_elements(mut self, value: impl Into<OptionValue<f64>>) -> Self {
        self.space_between_elements = Some(value.into());
        self
    }

    pub fn desired_element_height(mut self, value: impl Into<OptionValue<f64>>) -> Self {
        self.desired_element_height = Some(value.into());
        self
    }

    pub fn auto_font_size(mut self, value: impl Into<OptionValue<bool>>) -> Self {
        self.auto_font_size = Some(value.into());
        self
    }

    pub fn hide_box_on_missing_image(mut self, value: impl Into<OptionValue<bool>>) -> Self {
        self.hide_box_on_missing_image = Some(value.into());
        self
    }

    pub fn on_before_options_changed(mut self, hook: impl Fn(&JustifiedGrid) + 'static) -> Self {
        self.on_before_options_changed = Some(Arc::new(hook));
        self
    }

    pub fn on_options_changed(mut self, hook: impl Fn(&JustifiedGrid) + 'static) -> Self {
        self.on_options_changed = Some(Arc::new(hook));
        self
    }

    pub fn on_before_render(mut self, hook: impl Fn(&JustifiedGrid) + 'static) -> Self {
        self.on_before_render = Some(Arc::new(hook));
        self
    }

    pub fn on_render(mut self, hook: impl Fn(&JustifiedGrid) + 'static) -> Self {
        self.on_render = Some(Arc::new(hook));
        self
    }

    /// Options this patch sets, in declaration order.
    pub fn keys(&self) -> Vec<OptionKey> {
        let mut keys = Vec::new();
        if self.space_between_elements.is_some() {
            keys.push(OptionKey::SpaceBetweenElements);
        }
        if self.desired_element_height.is_some() {
            keys.push(OptionKey::DesiredElementHeight);
        }
        if self.auto_font_size.is_some() {
            keys.push(OptionKey::AutoFontSize);
        }
        if self.hide_box_on_missing_image.is_some() {
            keys.push(OptionKey::HideBoxOnMissingImage);
        }
        keys
    }

    /// Rejects literal lengths that are negative or not finite.
    pub fn validate(&self) -> Result<()> {
        let numbers = [
            (
                OptionKey::SpaceBetweenElements,
                &self.space_between_elements,
            ),
            (
                OptionKey::DesiredElementHeight,
                &self.desired_element_height,
            ),
        ];
        for (key, value) in numbers {
            if let Some(OptionValue::Literal(number)) = value {
                check_length(key, *number)?;
            }
        }
        Ok(())
    }
}

pub(crate) fn check_length(key: OptionKey, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(GridError::InvalidOption {
            name: key.name(),
            value,
        })
    }
}
