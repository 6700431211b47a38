//! # 编辑会话（应用状态）
//!
//! ## 设计思路
//!
//! 所有可变状态集中在一个显式的 `EditorSession` 中，以引用方式传给各组件，
//! 生命周期为 `init` → 逐个用户动作迁移 → `teardown`，没有任何全局单例。
//!
//! | 字段 | 含义 |
//! |------|------|
//! | `store` | 持久化图片仓库 |
//! | `workspace` | 工作区暂存引擎 |
//! | `handles` | 显示句柄管理器（工作区、缩略图、候选图共用） |
//! | `gallery_selection` | 画廊中当前选中的记录 |
//! | `picker` | 打开中的多图选择会话 |
//!
//! ## 错误语义
//!
//! 每个动作要么完整生效，要么不改变任何可观察状态；错误统一以 `AppError` 返回，
//! 并按分类记录日志（校验 / 未找到为 warn，存储 / 变换为 error）。

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use bytes::Bytes;

use crate::config::AppConfig;
use crate::db::{Dimensions, ImageStore, ImageTriple};
use crate::error::AppError;
use crate::handles::{DisplayHandle, HandleManager, HandleSlot};
use crate::loader;
use crate::operations::{
    FormInput, MultiOperationRequest, SelectedImage, validate_create_image, validate_multi,
    validate_operation,
};
use crate::selection::SelectionSession;
use crate::service::{TransformationService, complete_triple};
use crate::workspace::{Workspace, WorkspaceStatus, build_placeholder};

/// 画廊中的一项
#[derive(Debug, Clone)]
pub struct GalleryItem {
    pub id: i64,
    pub handle: DisplayHandle,
    pub dimensions: Option<Dimensions>,
    pub selected: bool,
}

/// 多图选择弹窗中的候选项
#[derive(Debug, Clone)]
pub struct CandidateItem {
    pub id: i64,
    pub handle: DisplayHandle,
    pub dimensions: Option<Dimensions>,
}

/// 工作区展示数据
#[derive(Debug, Clone)]
pub struct WorkspaceView {
    pub status: WorkspaceStatus,
    pub source_id: Option<i64>,
    pub image_url: Option<String>,
    pub histogram_url: Option<String>,
    /// 缩进 JSON，空元数据为 `{}`
    pub metadata_json: String,
    /// 换行分隔的历史记录
    pub history: String,
}

/// 保存结果
///
/// 持久化与导出是两件独立的事：记录一旦写入，结果就一定带回它的 id，
/// 即便随后导出失败。
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    /// 工作区为 `Dirty` 时新建的记录 id
    pub record_id: Option<i64>,
    /// 导出文件路径，或导出失败的原因
    pub export: Result<PathBuf, String>,
}

/// 编辑会话
pub struct EditorSession<S: TransformationService> {
    config: AppConfig,
    store: ImageStore,
    service: S,
    handles: HandleManager,
    workspace: Workspace,
    gallery_selection: Option<i64>,
    picker: Option<SelectionSession>,
}

impl<S: TransformationService> EditorSession<S> {
    /// 初始化会话：校验配置、生成占位图、工作区置为空白。
    pub fn init(config: AppConfig, store: ImageStore, service: S) -> Result<Self, AppError> {
        config.validate()?;
        let placeholder = build_placeholder(&config)?;
        let mut handles = HandleManager::new();
        let workspace = Workspace::new(placeholder, &mut handles);

        log::info!("🚀 编辑会话已初始化");
        Ok(Self {
            config,
            store,
            service,
            handles,
            workspace,
            gallery_selection: None,
            picker: None,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn handles(&self) -> &HandleManager {
        &self.handles
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn gallery_selection(&self) -> Option<i64> {
        self.gallery_selection
    }

    pub fn picker(&self) -> Option<&SelectionSession> {
        self.picker.as_ref()
    }

    // ------------------------------------------------------------------------
    // 仓库动作
    // ------------------------------------------------------------------------

    /// 上传本地文件：转换为规范格式、派生直方图与元数据、写入仓库。
    pub async fn upload(&mut self, path: &Path) -> Result<i64, AppError> {
        let result = self.upload_inner(path).await;
        log_outcome("上传", result)
    }

    async fn upload_inner(&mut self, path: &Path) -> Result<i64, AppError> {
        let total_start = Instant::now();
        let file = loader::load_from_file(path, &self.config)?;

        let convert_start = Instant::now();
        let image = self.service.to_canonical_format(file.bytes, &file.file_name).await?;
        let convert_ms = convert_start.elapsed().as_millis();

        let triple = complete_triple(&self.service, image).await?;
        let id = self.store.insert(&triple)?;

        log::info!(
            "⏱️ 上传完成 - id={}, 转换: {}ms, 总计: {}ms",
            id,
            convert_ms,
            total_start.elapsed().as_millis()
        );
        Ok(id)
    }

    /// 新建纯色空白图片并写入仓库。
    pub async fn create_blank(&mut self, form: &FormInput) -> Result<i64, AppError> {
        let result = self.create_blank_inner(form).await;
        log_outcome("新建空白图片", result)
    }

    async fn create_blank_inner(&mut self, form: &FormInput) -> Result<i64, AppError> {
        let request = validate_create_image(form)?;
        let image = self.service.create_image(&request).await?;
        let triple = complete_triple(&self.service, image).await?;
        let id = self.store.insert(&triple)?;
        log::info!(
            "🆕 空白图片已创建 - id={}, {}x{}, 颜色: {}",
            id,
            request.width,
            request.height,
            request.color
        );
        Ok(id)
    }

    /// 渲染画廊缩略图；先释放上一轮的全部缩略图句柄。
    pub fn gallery(&mut self) -> Result<Vec<GalleryItem>, AppError> {
        let records = log_outcome("读取画廊", self.store.get_all())?;
        self.handles
            .release_slots_where(|slot| matches!(slot, HandleSlot::Thumbnail(_)));

        Ok(records
            .iter()
            .map(|record| GalleryItem {
                id: record.id,
                handle: self.handles.assign(HandleSlot::Thumbnail(record.id), &record.triple.image),
                dimensions: record.dimensions(),
                selected: self.gallery_selection == Some(record.id),
            })
            .collect())
    }

    /// 在画廊中选中一条记录。
    pub fn pick(&mut self, id: i64) -> Result<(), AppError> {
        let result = self.store.get(id).map(|_| {
            self.gallery_selection = Some(id);
        });
        log_outcome("选中记录", result)
    }

    /// 删除画廊中选中的记录；若它正是工作区来源，工作区重置为空白。
    pub fn delete_selected(&mut self) -> Result<i64, AppError> {
        let result = self.delete_selected_inner();
        log_outcome("删除记录", result)
    }

    fn delete_selected_inner(&mut self) -> Result<i64, AppError> {
        let id = self
            .gallery_selection
            .ok_or_else(|| AppError::invalid("Please select an image to delete."))?;

        match self.store.delete_by_id(id) {
            Ok(()) => self.gallery_selection = None,
            Err(err @ AppError::NotFound(_)) => {
                self.gallery_selection = None;
                return Err(err);
            }
            Err(err) => return Err(err),
        }

        self.handles.release_slot(HandleSlot::Thumbnail(id));
        self.handles.release_slot(HandleSlot::Candidate(id));
        if self.workspace.source_id() == Some(id) {
            log::info!("🗑️ 删除的记录正在工作区中，重置工作区");
            self.workspace.reset(&mut self.handles);
        }
        log::info!("🗑️ 已删除记录 id={}", id);
        Ok(id)
    }

    // ------------------------------------------------------------------------
    // 工作区动作
    // ------------------------------------------------------------------------

    /// 将画廊选中的记录载入工作区（值快照）。
    pub fn load_into_workspace(&mut self) -> Result<(), AppError> {
        let result = self.load_into_workspace_inner();
        log_outcome("载入工作区", result)
    }

    fn load_into_workspace_inner(&mut self) -> Result<(), AppError> {
        let id = self
            .gallery_selection
            .ok_or_else(|| AppError::invalid("Please select an image to load into the workspace."))?;
        let record = self.store.get(id)?;
        self.workspace.select(&record, &mut self.handles);
        Ok(())
    }

    pub fn clear_workspace(&mut self) {
        self.workspace.reset(&mut self.handles);
    }

    /// 保存工作区：`Dirty` 时写入新记录；无论持久化是否成功都导出当前图片。
    ///
    /// - 持久化失败：尝试导出后返回存储错误，仓库与工作区不变。
    /// - 已持久化但导出失败：返回 `Ok`，`export` 中携带失败原因。
    /// - 未持久化且导出失败：返回 I/O 错误。
    pub fn save_workspace(&mut self, download_dir: &Path) -> Result<SaveOutcome, AppError> {
        let result = self.save_workspace_inner(download_dir);
        log_outcome("保存工作区", result)
    }

    fn save_workspace_inner(&mut self, download_dir: &Path) -> Result<SaveOutcome, AppError> {
        let persisted = if self.workspace.is_modified() {
            match self.store.insert(self.workspace.triple()) {
                Ok(id) => {
                    self.workspace.mark_saved(id);
                    log::info!("💾 工作区已持久化为记录 id={}", id);
                    Ok(Some(id))
                }
                Err(err) => Err(err),
            }
        } else {
            log::debug!("工作区未修改，跳过持久化");
            Ok(None)
        };

        let exported_to = download_dir.join(&self.config.download_file_name);
        let exported = fs::create_dir_all(download_dir)
            .and_then(|_| fs::write(&exported_to, &self.workspace.triple().image));
        match &exported {
            Ok(()) => log::info!("📤 当前图片已导出到 {}", exported_to.display()),
            Err(err) => log::error!("❌ 导出到 {} 失败: {}", exported_to.display(), err),
        }

        match (persisted?, exported) {
            (record_id, Ok(())) => Ok(SaveOutcome { record_id, export: Ok(exported_to) }),
            (Some(id), Err(err)) => Ok(SaveOutcome {
                record_id: Some(id),
                export: Err(format!("{}: {}", exported_to.display(), err)),
            }),
            (None, Err(err)) => Err(AppError::Io(err)),
        }
    }

    /// 校验并应用单图变换，返回追加的历史条目。
    pub async fn apply_operation(&mut self, kind: &str, form: &FormInput) -> Result<String, AppError> {
        let result = self.apply_operation_inner(kind, form).await;
        log_outcome("应用单图变换", result)
    }

    async fn apply_operation_inner(&mut self, kind: &str, form: &FormInput) -> Result<String, AppError> {
        let descriptor = validate_operation(kind, form)?;
        let ticket = self.workspace.begin_transformation()?;

        let total_start = Instant::now();
        let transform_start = Instant::now();
        let image = self.service.transform(ticket.image(), &descriptor).await?;
        let transform_ms = transform_start.elapsed().as_millis();

        let triple = complete_triple(&self.service, image).await?;
        let entry = descriptor.history_entry();
        self.workspace
            .commit(ticket, triple, entry.clone(), &mut self.handles)?;

        log::info!(
            "⏱️ 变换完成 - {}: 变换 {}ms, 总计 {}ms",
            descriptor.kind,
            transform_ms,
            total_start.elapsed().as_millis()
        );
        Ok(entry)
    }

    // ------------------------------------------------------------------------
    // 多图动作
    // ------------------------------------------------------------------------

    /// 打开多图选择：计算候选集并渲染候选缩略图。
    pub fn open_picker(&mut self, kind: &str) -> Result<Vec<CandidateItem>, AppError> {
        let result = self.open_picker_inner(kind);
        log_outcome("打开多图选择", result)
    }

    fn open_picker_inner(&mut self, kind: &str) -> Result<Vec<CandidateItem>, AppError> {
        let records = self.store.get_all()?;
        let session = SelectionSession::open(kind, &records, self.workspace.dimensions())?;

        self.release_candidates();
        let items = session
            .candidates()
            .iter()
            .filter_map(|candidate| records.iter().find(|record| record.id == candidate.id))
            .map(|record| CandidateItem {
                id: record.id,
                handle: self.handles.assign(HandleSlot::Candidate(record.id), &record.triple.image),
                dimensions: record.dimensions(),
            })
            .collect();
        self.picker = Some(session);
        Ok(items)
    }

    /// 切换候选图的选中状态。
    pub fn toggle_candidate(&mut self, id: i64) -> Result<bool, AppError> {
        let result = match self.picker.as_mut() {
            Some(picker) => picker.toggle(id),
            None => Err(AppError::invalid("No multi-image selection is open.")),
        };
        log_outcome("切换候选图", result)
    }

    /// 关闭选择弹窗并释放候选缩略图。
    pub fn close_picker(&mut self) {
        self.release_candidates();
        self.picker = None;
    }

    fn release_candidates(&mut self) {
        self.handles
            .release_slots_where(|slot| matches!(slot, HandleSlot::Candidate(_)));
    }

    /// 确认弹窗中的选择并应用组合操作；成功后关闭弹窗。
    pub async fn confirm_picker(
        &mut self,
        src_region: Option<String>,
        dest_position: Option<String>,
    ) -> Result<String, AppError> {
        let confirmed = match self.picker.as_ref() {
            Some(picker) => picker
                .confirm()
                .map(|images| (picker.kind(), images.iter().map(|image| image.id).collect::<Vec<_>>())),
            None => Err(AppError::invalid("No multi-image selection is open.")),
        };
        let (kind, ids) = log_outcome("确认多图选择", confirmed)?;

        let entry = self
            .apply_multi_operation(kind.as_str(), &ids, src_region, dest_position)
            .await?;
        self.close_picker();
        Ok(entry)
    }

    /// 校验并应用多图组合操作，返回追加的历史条目。
    ///
    /// add / subtract 先发送工作区图片再按选择顺序发送选中图片；
    /// cut_and_paste 按 源、目标 顺序发送两张选中图片。
    pub async fn apply_multi_operation(
        &mut self,
        kind: &str,
        selection: &[i64],
        src_region: Option<String>,
        dest_position: Option<String>,
    ) -> Result<String, AppError> {
        let result = self
            .apply_multi_inner(kind, selection, src_region, dest_position)
            .await;
        log_outcome("应用多图变换", result)
    }

    async fn apply_multi_inner(
        &mut self,
        kind: &str,
        selection: &[i64],
        src_region: Option<String>,
        dest_position: Option<String>,
    ) -> Result<String, AppError> {
        let records = selection
            .iter()
            .map(|id| self.store.get(*id))
            .collect::<Result<Vec<_>, _>>()?;

        let request = MultiOperationRequest {
            kind: kind.to_string(),
            images: records
                .iter()
                .map(|record| SelectedImage { id: record.id, dimensions: record.dimensions() })
                .collect(),
            src_region,
            dest_position,
        };
        let descriptor = validate_multi(&request, self.workspace.dimensions())?;
        let ticket = self.workspace.begin_transformation()?;

        let mut images: Vec<Bytes> = Vec::with_capacity(records.len() + 1);
        if descriptor.kind.requires_matching_dimensions() {
            images.push(ticket.image().clone());
        }
        images.extend(records.iter().map(|record| record.triple.image.clone()));

        let total_start = Instant::now();
        let image = self.service.transform_multi(&images, &descriptor).await?;
        let triple: ImageTriple = complete_triple(&self.service, image).await?;
        let entry = descriptor.history_entry();
        self.workspace
            .commit(ticket, triple, entry.clone(), &mut self.handles)?;

        log::info!(
            "⏱️ 多图变换完成 - {}: {} 张图片, 总计 {}ms",
            descriptor.kind,
            images.len(),
            total_start.elapsed().as_millis()
        );
        Ok(entry)
    }

    // ------------------------------------------------------------------------
    // 展示与收尾
    // ------------------------------------------------------------------------

    /// 工作区展示数据：图片与直方图的 data URL、元数据 JSON、历史记录。
    pub fn workspace_view(&self) -> WorkspaceView {
        let url = |slot: HandleSlot| {
            self.handles
                .slot_handle(slot)
                .and_then(|handle| self.handles.data_url(handle))
        };
        WorkspaceView {
            status: self.workspace.status(),
            source_id: self.workspace.source_id(),
            image_url: url(HandleSlot::WorkspaceImage),
            histogram_url: url(HandleSlot::WorkspaceHistogram),
            metadata_json: self.workspace.metadata().to_pretty_json(),
            history: self.workspace.history().join("\n"),
        }
    }

    /// 会话结束：释放全部显示句柄。
    pub fn teardown(mut self) -> ImageStore {
        let released = self.handles.release_all();
        log::info!("👋 会话结束，释放显示句柄 {} 个", released);
        self.store
    }
}

/// 按错误分类记录日志后原样返回。
fn log_outcome<T>(action: &str, result: Result<T, AppError>) -> Result<T, AppError> {
    if let Err(err) = &result {
        match err {
            AppError::Validation(_) | AppError::NotFound(_) | AppError::WorkspaceEmpty => {
                log::warn!("⚠️ {}未执行: {}", action, err);
            }
            AppError::WorkspaceBusy | AppError::StaleTransformation => {
                log::warn!("⏳ {}被拒绝: {}", action, err);
            }
            _ => log::error!("❌ {}失败: {}", action, err),
        }
    }
    result
}
