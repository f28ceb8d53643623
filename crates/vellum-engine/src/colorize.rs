// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::column::{Column, DisplayCell};
use crate::row::Row;
use crate::sheet::Sheet;
use std::sync::Arc;

/// Terminal-free color names. The tui crate maps these onto its backend
/// palette; the engine only reasons about which rule wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteColor {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    Gray,
}

/// A partial style: unset attributes leave lower-precedence results
/// visible. Boolean attributes are set-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellStyle {
    pub fg: Option<PaletteColor>,
    pub bg: Option<PaletteColor>,
    pub bold: bool,
    pub underline: bool,
    pub reverse: bool,
}

impl CellStyle {
    pub fn fg(color: PaletteColor) -> Self {
        Self {
            fg: Some(color),
            ..Self::default()
        }
    }

    pub fn bg(color: PaletteColor) -> Self {
        Self {
            bg: Some(color),
            ..Self::default()
        }
    }

    pub const fn with_bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub const fn with_reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub const fn with_underline(mut self) -> Self {
        self.underline = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorizerScope {
    Row,
    Column,
    Header,
    Cell,
}

pub type ColorRule = dyn Fn(&Sheet, Option<&Column>, Option<&Row>, Option<&DisplayCell>) -> Option<CellStyle>
    + Send
    + Sync;

/// One precedence-tagged style rule. Multiple colorizers may fire for a
/// single cell; precedence settles conflicts per attribute rather than
/// per rule, so a row rule's background survives a cell rule that only
/// sets a foreground.
#[derive(Clone)]
pub struct Colorizer {
    pub scope: ColorizerScope,
    pub precedence: i8,
    rule: Arc<ColorRule>,
}

impl Colorizer {
    pub fn new<R>(scope: ColorizerScope, precedence: i8, rule: R) -> Self
    where
        R: Fn(&Sheet, Option<&Column>, Option<&Row>, Option<&DisplayCell>) -> Option<CellStyle>
            + Send
            + Sync
            + 'static,
    {
        Self {
            scope,
            precedence,
            rule: Arc::new(rule),
        }
    }
}

/// Accumulates rule results attribute by attribute, keeping the highest
/// precedence seen for each attribute.
#[derive(Debug, Default)]
struct StyleAccumulator {
    fg: Option<(PaletteColor, i8)>,
    bg: Option<(PaletteColor, i8)>,
    bold: Option<i8>,
    underline: Option<i8>,
    reverse: Option<i8>,
}

impl StyleAccumulator {
    fn merge(&mut self, style: CellStyle, precedence: i8) {
        if let Some(color) = style.fg
            && self.fg.is_none_or(|(_, held)| precedence >= held)
        {
            self.fg = Some((color, precedence));
        }
        if let Some(color) = style.bg
            && self.bg.is_none_or(|(_, held)| precedence >= held)
        {
            self.bg = Some((color, precedence));
        }
        if style.bold && self.bold.is_none_or(|held| precedence >= held) {
            self.bold = Some(precedence);
        }
        if style.underline && self.underline.is_none_or(|held| precedence >= held) {
            self.underline = Some(precedence);
        }
        if style.reverse && self.reverse.is_none_or(|held| precedence >= held) {
            self.reverse = Some(precedence);
        }
    }

    fn finish(self) -> CellStyle {
        CellStyle {
            fg: self.fg.map(|(color, _)| color),
            bg: self.bg.map(|(color, _)| color),
            bold: self.bold.is_some(),
            underline: self.underline.is_some(),
            reverse: self.reverse.is_some(),
        }
    }
}

/// Resolve the style for one cell/header/row by walking the requested
/// scopes in order and, within each scope, the colorizers by ascending
/// precedence.
pub fn colorize(
    colorizers: &[Colorizer],
    scopes: &[ColorizerScope],
    sheet: &Sheet,
    column: Option<&Column>,
    row: Option<&Row>,
    cell: Option<&DisplayCell>,
) -> CellStyle {
    let mut accumulated = StyleAccumulator::default();
    for scope in scopes {
        let mut in_scope: Vec<&Colorizer> = colorizers
            .iter()
            .filter(|colorizer| colorizer.scope == *scope)
            .collect();
        in_scope.sort_by_key(|colorizer| colorizer.precedence);
        for colorizer in in_scope {
            if let Some(style) = (colorizer.rule)(sheet, column, row, cell) {
                accumulated.merge(style, colorizer.precedence);
            }
        }
    }
    accumulated.finish()
}
