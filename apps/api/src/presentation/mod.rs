//! Client view state for the map and list screens.
//!
//! `MapView` is a plain state machine: the front end feeds it `Event`s and
//! executes the `Effect`s it returns. Groups are rebuilt from the record list
//! after every change, and the selection follows the selected record across
//! rebuilds.

pub mod edit;
pub mod gesture;
pub mod viewer;

use crate::memories::geo::Coordinate;
use crate::memories::grouping::{group_for_display, DishGroup, GroupedMemories};
use crate::memories::patch::normalize_text;
use crate::models::memory::MemoryRecord;

use self::edit::{EditBuffers, RecordEdit};
use self::gesture::Cursor;
use self::viewer::{TapOutcome, Viewer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Map,
    List,
}

/// Something under the pointer, topmost first.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickTarget {
    Marker(String),
    Background,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Fire-and-forget PATCH /memories/:id.
    PatchRecord { id: i64, edit: RecordEdit },
    CenterMap(Coordinate),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    RecordsLoaded(Vec<MemoryRecord>),
    /// A record as returned by the server after a patch.
    RecordSaved(MemoryRecord),
    Click(Vec<ClickTarget>),
    SelectFromList(i64),
    MarkerSwipe(f64),
    ToggleSheet,
    ToggleViewMode,
    OpenViewer { images: Vec<String>, start: usize },
    ViewerSwipe(f64),
    ViewerTap { x: f64, width: f64 },
    CloseViewer,
    Escape,
    AddTag(String),
    RemoveTag(String),
    EditNote(String),
    BlurNote,
    EditDishName(String),
    BlurDishName,
    UploadSucceeded {
        record: MemoryRecord,
        nearby_restaurants: Vec<String>,
    },
    EditPendingDish(String),
    EditPendingRestaurant(String),
    ConfirmPending,
}

#[derive(Debug, Clone, PartialEq)]
struct Selection {
    group_key: String,
    cursor: Cursor,
}

/// A fresh upload waiting for the user to confirm its names.
#[derive(Debug, Clone, PartialEq)]
pub struct Pending {
    pub record: MemoryRecord,
    pub nearby_restaurants: Vec<String>,
    pub dish_name: String,
    pub restaurant_name: String,
}

impl Pending {
    fn new(record: MemoryRecord, nearby_restaurants: Vec<String>) -> Self {
        Self {
            dish_name: record.dish_name.clone().unwrap_or_default(),
            restaurant_name: record.restaurant_name.clone().unwrap_or_default(),
            record,
            nearby_restaurants,
        }
    }

    fn edit(&self) -> RecordEdit {
        let mut edit = RecordEdit::default();
        if normalize_text(&self.dish_name) != self.record.dish_name {
            edit.dish_name = Some(self.dish_name.clone());
        }
        if normalize_text(&self.restaurant_name) != self.record.restaurant_name {
            edit.restaurant_name = Some(self.restaurant_name.clone());
        }
        edit
    }
}

#[derive(Debug, Clone)]
pub struct MapView {
    records: Vec<MemoryRecord>,
    groups: GroupedMemories,
    selection: Option<Selection>,
    edits: Option<EditBuffers>,
    viewer: Option<Viewer>,
    pending: Option<Pending>,
    sheet_expanded: bool,
    view_mode: ViewMode,
}

impl Default for MapView {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl MapView {
    /// `records` most recent first, as served by GET /memories.
    pub fn new(records: Vec<MemoryRecord>) -> Self {
        let groups = group_for_display(&records);
        Self {
            records,
            groups,
            selection: None,
            edits: None,
            viewer: None,
            pending: None,
            sheet_expanded: false,
            view_mode: ViewMode::Map,
        }
    }

    pub fn records(&self) -> &[MemoryRecord] {
        &self.records
    }

    pub fn markers(&self) -> &[DishGroup] {
        &self.groups.markers
    }

    pub fn list(&self) -> &[DishGroup] {
        &self.groups.list
    }

    pub fn selected_group(&self) -> Option<&DishGroup> {
        let selection = self.selection.as_ref()?;
        self.group(&selection.group_key)
    }

    pub fn selected_record(&self) -> Option<&MemoryRecord> {
        let selection = self.selection.as_ref()?;
        self.group(&selection.group_key)?
            .members
            .get(selection.cursor.index())
    }

    /// Position of the marker cursor, if a group is selected.
    pub fn cursor_index(&self) -> Option<usize> {
        self.selection.as_ref().map(|s| s.cursor.index())
    }

    pub fn edits(&self) -> Option<&EditBuffers> {
        self.edits.as_ref()
    }

    pub fn viewer(&self) -> Option<&Viewer> {
        self.viewer.as_ref()
    }

    pub fn pending(&self) -> Option<&Pending> {
        self.pending.as_ref()
    }

    pub fn sheet_expanded(&self) -> bool {
        self.sheet_expanded
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::RecordsLoaded(records) => {
                self.records = records;
                self.regroup();
            }
            Event::RecordSaved(record) => self.replace_record(record),
            Event::Click(targets) => {
                for target in &targets {
                    if self.click(target) {
                        break;
                    }
                }
            }
            Event::SelectFromList(id) => return self.select_from_list(id),
            Event::MarkerSwipe(dx) => self.marker_swipe(dx),
            Event::ToggleSheet => self.sheet_expanded = !self.sheet_expanded,
            Event::ToggleViewMode => {
                self.view_mode = match self.view_mode {
                    ViewMode::Map => ViewMode::List,
                    ViewMode::List => ViewMode::Map,
                }
            }
            Event::OpenViewer { images, start } => self.viewer = Viewer::open(images, start),
            Event::ViewerSwipe(dx) => {
                if let Some(viewer) = self.viewer.as_mut() {
                    viewer.swipe(dx);
                }
            }
            Event::ViewerTap { x, width } => {
                if let Some(viewer) = self.viewer.as_mut() {
                    if viewer.tap(x, width) == TapOutcome::Close {
                        self.viewer = None;
                    }
                }
            }
            Event::CloseViewer => self.viewer = None,
            Event::Escape => {
                if self.viewer.is_some() {
                    self.viewer = None;
                } else {
                    self.deselect();
                }
            }
            Event::AddTag(tag) => {
                let edit = self.edits.as_mut().and_then(|e| e.add_tag(&tag));
                return self.commit(edit);
            }
            Event::RemoveTag(tag) => {
                let edit = self.edits.as_mut().and_then(|e| e.remove_tag(&tag));
                return self.commit(edit);
            }
            Event::EditNote(text) => {
                if let Some(edits) = self.edits.as_mut() {
                    edits.set_note(text);
                }
            }
            Event::BlurNote => {
                let edit = self.edits.as_mut().and_then(EditBuffers::blur_note);
                return self.commit(edit);
            }
            Event::EditDishName(text) => {
                if let Some(edits) = self.edits.as_mut() {
                    edits.set_dish_name(text);
                }
            }
            Event::BlurDishName => {
                let edit = self.edits.as_mut().and_then(EditBuffers::blur_dish_name);
                return self.commit(edit);
            }
            Event::UploadSucceeded {
                record,
                nearby_restaurants,
            } => self.pending = Some(Pending::new(record, nearby_restaurants)),
            Event::EditPendingDish(text) => {
                if let Some(pending) = self.pending.as_mut() {
                    pending.dish_name = text;
                }
            }
            Event::EditPendingRestaurant(text) => {
                if let Some(pending) = self.pending.as_mut() {
                    pending.restaurant_name = text;
                }
            }
            Event::ConfirmPending => return self.confirm_pending(),
        }
        Vec::new()
    }

    fn group(&self, key: &str) -> Option<&DishGroup> {
        self.groups.markers.iter().find(|g| g.key == key)
    }

    /// Group key, member index and group size for a record id.
    fn locate(&self, id: i64) -> Option<(String, usize, usize)> {
        self.groups.markers.iter().find_map(|g| {
            g.members
                .iter()
                .position(|m| m.id == id)
                .map(|i| (g.key.clone(), i, g.members.len()))
        })
    }

    /// Returns whether the click was consumed.
    fn click(&mut self, target: &ClickTarget) -> bool {
        match target {
            ClickTarget::Marker(key) => {
                let Some(len) = self.group(key).map(|g| g.members.len()) else {
                    return false;
                };
                if self.selection.as_ref().is_some_and(|s| &s.group_key == key) {
                    self.deselect();
                } else {
                    self.select(key.clone(), Cursor::new(len));
                }
                true
            }
            ClickTarget::Background => {
                self.deselect();
                true
            }
        }
    }

    fn select(&mut self, group_key: String, cursor: Cursor) {
        self.selection = Some(Selection { group_key, cursor });
        self.reseed();
    }

    fn deselect(&mut self) {
        self.selection = None;
        self.edits = None;
        self.sheet_expanded = false;
    }

    /// Seeds the edit buffers when the selected record changed.
    fn reseed(&mut self) {
        let current = self.selected_record().map(EditBuffers::seed);
        let unchanged = matches!(
            (&self.edits, &current),
            (Some(existing), Some(fresh)) if existing.record_id() == fresh.record_id()
        );
        if !unchanged {
            self.edits = current;
        }
    }

    fn select_from_list(&mut self, id: i64) -> Vec<Effect> {
        if self.selected_record().is_some_and(|r| r.id == id) {
            self.deselect();
            return Vec::new();
        }
        let Some((key, index, len)) = self.locate(id) else {
            return Vec::new();
        };
        self.select(key, Cursor::at(index, len));
        self.view_mode = ViewMode::Map;
        self.selected_record()
            .map(|r| vec![Effect::CenterMap(r.coordinate())])
            .unwrap_or_default()
    }

    fn marker_swipe(&mut self, dx: f64) {
        let moved = self
            .selection
            .as_mut()
            .is_some_and(|s| s.cursor.swipe(dx));
        if moved {
            self.reseed();
        }
    }

    /// Applies an edit locally and asks the front end to persist it.
    fn commit(&mut self, edit: Option<RecordEdit>) -> Vec<Effect> {
        let Some(edit) = edit.filter(|e| !e.is_empty()) else {
            return Vec::new();
        };
        let Some(id) = self.edits.as_ref().map(EditBuffers::record_id) else {
            return Vec::new();
        };
        if let Some(record) = self.records.iter_mut().find(|r| r.id == id) {
            edit.apply_to(record);
        }
        self.regroup();
        vec![Effect::PatchRecord { id, edit }]
    }

    fn replace_record(&mut self, record: MemoryRecord) {
        if let Some(pending) = self.pending.as_mut().filter(|p| p.record.id == record.id) {
            pending.record = record;
            return;
        }
        if let Some(existing) = self.records.iter_mut().find(|r| r.id == record.id) {
            *existing = record;
            self.regroup();
        }
    }

    fn confirm_pending(&mut self) -> Vec<Effect> {
        let Some(pending) = self.pending.take() else {
            return Vec::new();
        };
        let mut record = pending.record.clone();
        let mut effects = Vec::new();

        let edit = pending.edit();
        if !edit.is_empty() {
            edit.apply_to(&mut record);
            effects.push(Effect::PatchRecord {
                id: record.id,
                edit,
            });
        }

        let center = record.coordinate();
        self.records.retain(|r| r.id != record.id);
        self.records.insert(0, record);
        self.regroup();
        effects.push(Effect::CenterMap(center));
        effects
    }

    /// Rebuilds groups and re-points the selection at the same record.
    fn regroup(&mut self) {
        let selected_id = self.selected_record().map(|r| r.id);
        self.groups = group_for_display(&self.records);

        let Some(id) = selected_id else {
            self.selection = None;
            self.edits = None;
            return;
        };
        match self.locate(id) {
            Some((key, index, len)) => {
                self.selection = Some(Selection {
                    group_key: key,
                    cursor: Cursor::at(index, len),
                });
                self.reseed();
            }
            None => self.deselect(),
        }
    }
}
