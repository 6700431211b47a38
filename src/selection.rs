//! # 多图选择
//!
//! ## 设计思路
//!
//! 打开选择弹窗时按组合操作种类计算候选集：add / subtract 只列出与工作区尺寸一致的记录，
//! cut_and_paste 列出全部记录。用户逐个切换选中状态：
//!
//! - cut_and_paste 最多两张，先选中的是源、后选中的是目标；
//! - add / subtract 不设上限，但至少一张。
//!
//! 确认时先检查数量，数量不对直接拒绝，不会进入校验管线。

use crate::db::{Dimensions, ImageRecord};
use crate::error::AppError;
use crate::operations::{MultiOperationKind, SelectedImage};

const CUT_AND_PASTE_LIMIT: usize = 2;

/// 一次多图选择会话
#[derive(Debug, Clone)]
pub struct SelectionSession {
    kind: MultiOperationKind,
    candidates: Vec<SelectedImage>,
    selected: Vec<i64>,
}

impl SelectionSession {
    /// 根据操作种类计算候选集。
    pub fn open(
        kind: &str,
        records: &[ImageRecord],
        workspace: Option<Dimensions>,
    ) -> Result<Self, AppError> {
        let kind = MultiOperationKind::parse(kind).ok_or_else(|| {
            AppError::invalid("Operation must be one of {add, subtract, cut_and_paste}.")
        })?;

        let all = records
            .iter()
            .map(|record| SelectedImage { id: record.id, dimensions: record.dimensions() });

        let candidates: Vec<SelectedImage> = if kind.requires_matching_dimensions() {
            let expected = workspace.ok_or_else(|| {
                AppError::invalid("Workspace image dimensions not available for this operation.")
            })?;
            all.filter(|image| image.dimensions == Some(expected)).collect()
        } else {
            all.collect()
        };

        if candidates.is_empty() {
            let message = if kind.requires_matching_dimensions() {
                "No images available with the same dimensions as the workspace image."
            } else {
                "No images available for this operation."
            };
            return Err(AppError::invalid(message));
        }

        log::info!("🖼️ 打开多图选择 - 操作: {}, 候选: {} 张", kind, candidates.len());
        Ok(Self { kind, candidates, selected: Vec::new() })
    }

    pub fn kind(&self) -> MultiOperationKind {
        self.kind
    }

    pub fn candidates(&self) -> &[SelectedImage] {
        &self.candidates
    }

    /// 已选 id，按选中顺序。
    pub fn selected(&self) -> &[i64] {
        &self.selected
    }

    pub fn is_selected(&self, id: i64) -> bool {
        self.selected.contains(&id)
    }

    /// 切换选中状态，返回切换后是否选中。
    pub fn toggle(&mut self, id: i64) -> Result<bool, AppError> {
        if !self.candidates.iter().any(|candidate| candidate.id == id) {
            return Err(AppError::NotFound(id));
        }

        if let Some(position) = self.selected.iter().position(|selected| *selected == id) {
            self.selected.remove(position);
            return Ok(false);
        }

        if self.kind == MultiOperationKind::CutAndPaste && self.selected.len() >= CUT_AND_PASTE_LIMIT {
            return Err(AppError::invalid(
                "You can only select up to 2 images for the Cut and Paste operation.",
            ));
        }

        self.selected.push(id);
        Ok(true)
    }

    /// 检查数量并返回按选中顺序排列的图片。
    pub fn confirm(&self) -> Result<Vec<SelectedImage>, AppError> {
        match self.kind {
            MultiOperationKind::CutAndPaste if self.selected.len() != CUT_AND_PASTE_LIMIT => {
                return Err(AppError::invalid(
                    "Cut and Paste operation requires exactly two images (source and destination).",
                ));
            }
            kind if self.selected.is_empty() => {
                return Err(AppError::invalid(format!(
                    "Please select at least one image for the {} operation.",
                    kind.as_str()
                )));
            }
            _ => {}
        }

        Ok(self
            .selected
            .iter()
            .filter_map(|id| self.candidates.iter().find(|candidate| candidate.id == *id))
            .copied()
            .collect())
    }
}
