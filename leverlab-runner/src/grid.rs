//! The searched settings grid.
//!
//! A grid point is one indicator-parameter point crossed with one
//! [`DynamicOrderSettings`] point. Points are addressed by a mixed-radix
//! index over every axis: indicator axes vary slowest, then the order axes
//! in [`GridConfig::axis_names`] order, the last order axis fastest.
//! Points are decoded on demand and never materialized as a whole.

use std::ops::Range;

use thiserror::Error;

use leverlab_core::settings::DynamicOrderSettings;
use leverlab_core::signals::{ParamAxis, Strategy};

use crate::config::GridConfig;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("grid axis {0} has no values")]
    EmptyAxis(String),

    #[error("grid has more points than can be indexed")]
    TooLarge,
}

/// One decoded grid point.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPoint {
    pub settings_index: usize,
    /// Index of the indicator-parameter point alone.
    pub indicator_index: usize,
    pub indicator_params: Vec<f64>,
    pub dynamic: DynamicOrderSettings,
}

#[derive(Debug, Clone)]
pub struct SettingsGrid {
    order: GridConfig,
    indicator_axes: Vec<ParamAxis>,
    order_points: usize,
    indicator_points: usize,
    len: usize,
}

impl SettingsGrid {
    pub fn new(order: GridConfig, indicator_axes: Vec<ParamAxis>) -> Result<Self, GridError> {
        for axis in &indicator_axes {
            if axis.values.is_empty() {
                return Err(GridError::EmptyAxis(axis.name.clone()));
            }
        }
        for (name, len) in GridConfig::axis_names().into_iter().zip(order.radices()) {
            if len == 0 {
                return Err(GridError::EmptyAxis(name.to_string()));
            }
        }

        let order_points = checked_product(order.radices().into_iter())?;
        let indicator_points = checked_product(indicator_axes.iter().map(|a| a.values.len()))?;
        let len = order_points
            .checked_mul(indicator_points)
            .ok_or(GridError::TooLarge)?;

        Ok(Self {
            order,
            indicator_axes,
            order_points,
            indicator_points,
            len,
        })
    }

    /// Grid over the order settings and the strategy's indicator axes.
    pub fn for_strategy(order: GridConfig, strategy: &dyn Strategy) -> Result<Self, GridError> {
        Self::new(order, strategy.indicator_axes())
    }

    /// Total number of points, valid or not.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn indicator_points(&self) -> usize {
        self.indicator_points
    }

    pub fn order_points(&self) -> usize {
        self.order_points
    }

    pub fn indicator_names(&self) -> Vec<String> {
        self.indicator_axes.iter().map(|a| a.name.clone()).collect()
    }

    /// Decodes the point at `settings_index`.
    pub fn point(&self, settings_index: usize) -> Option<GridPoint> {
        if settings_index >= self.len {
            return None;
        }
        let indicator_index = settings_index / self.order_points;
        let order_index = settings_index % self.order_points;
        Some(GridPoint {
            settings_index,
            indicator_index,
            indicator_params: self.indicator_params(indicator_index),
            dynamic: self.dynamic_settings(order_index),
        })
    }

    /// Points in `range`, decoded lazily.
    pub fn points(&self, range: Range<usize>) -> impl Iterator<Item = GridPoint> + '_ {
        let end = range.end.min(self.len);
        (range.start..end).filter_map(move |i| self.point(i))
    }

    /// Validity rule: the order settings' rule and the strategy's rule.
    pub fn is_valid(point: &GridPoint, strategy: &dyn Strategy) -> bool {
        point.dynamic.is_valid_combination() && strategy.is_valid(&point.indicator_params)
    }

    fn indicator_params(&self, mut index: usize) -> Vec<f64> {
        let mut params = vec![0.0; self.indicator_axes.len()];
        for (slot, axis) in params.iter_mut().zip(&self.indicator_axes).rev() {
            let n = axis.values.len();
            *slot = axis.values[index % n];
            index /= n;
        }
        params
    }

    fn dynamic_settings(&self, mut index: usize) -> DynamicOrderSettings {
        let radices = self.order.radices();
        let mut digits = [0usize; GridConfig::AXES];
        for (digit, n) in digits.iter_mut().zip(radices).rev() {
            *digit = index % n;
            index /= n;
        }
        self.order.settings_at(&digits)
    }
}

fn checked_product(lens: impl Iterator<Item = usize>) -> Result<usize, GridError> {
    let mut acc = 1usize;
    for n in lens {
        acc = acc.checked_mul(n).ok_or(GridError::TooLarge)?;
    }
    Ok(acc)
}
