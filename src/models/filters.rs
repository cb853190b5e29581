use uuid::Uuid;

use super::enums::{Role, SortOrder};

/// Columns a schedule listing may be ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScheduleSortKey {
    #[default]
    Date,
    StartTime,
    EndTime,
    Fees,
    CreatedAt,
}

impl ScheduleSortKey {
    pub fn column(&self) -> &'static str {
        match self {
            Self::Date => "s.date",
            Self::StartTime => "s.start_time",
            Self::EndTime => "s.end_time",
            Self::Fees => "s.fees",
            Self::CreatedAt => "s.created_at",
        }
    }

    /// Unknown keys fall back to `Date`.
    pub fn parse(s: &str) -> Self {
        match s {
            "start_time" | "StartTime" => Self::StartTime,
            "end_time" | "EndTime" => Self::EndTime,
            "fees" | "Fees" => Self::Fees,
            "created_at" | "createdAt" => Self::CreatedAt,
            _ => Self::Date,
        }
    }
}

#[derive(Debug, Default)]
pub struct ScheduleFilter {
    /// Case-insensitive substring over date, times, location, notes and status.
    pub search: Option<String>,
    pub staff_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub sort_key: ScheduleSortKey,
    pub sort_order: Option<SortOrder>,
    /// 1-based page; ignored without `page_size`.
    pub page: u32,
    pub page_size: Option<u32>,
}

/// Columns a patient listing may be ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PatientSortKey {
    #[default]
    FirstName,
    LastName,
    Email,
    Phone,
    CreatedAt,
}

impl PatientSortKey {
    pub fn column(&self) -> &'static str {
        match self {
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::CreatedAt => "created_at",
        }
    }

    /// Unknown keys fall back to `FirstName`.
    pub fn parse(s: &str) -> Self {
        match s {
            "last_name" | "lastName" => Self::LastName,
            "email" => Self::Email,
            "phone" => Self::Phone,
            "created_at" | "createdAt" => Self::CreatedAt,
            _ => Self::FirstName,
        }
    }
}

#[derive(Debug, Default)]
pub struct PatientFilter {
    /// Case-insensitive substring over names, email, phone and diagnosis.
    pub search: Option<String>,
    pub staff_id: Option<Uuid>,
    pub sort_key: PatientSortKey,
    pub sort_order: Option<SortOrder>,
    pub page: u32,
    pub page_size: Option<u32>,
}

#[derive(Debug, Default)]
pub struct StaffFilter {
    /// Case-insensitive substring over first and last name.
    pub search: Option<String>,
    pub role: Option<Role>,
    pub page: u32,
    pub page_size: Option<u32>,
}

/// Columns a report listing may be ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportSortKey {
    #[default]
    Date,
    /// Patient name, last then first.
    Patient,
    CreatedAt,
}

impl ReportSortKey {
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::Date => &["r.date"],
            Self::Patient => &["p.last_name COLLATE NOCASE", "p.first_name COLLATE NOCASE"],
            Self::CreatedAt => &["r.created_at"],
        }
    }

    /// Unknown keys fall back to `Date`.
    pub fn parse(s: &str) -> Self {
        match s {
            "patient" => Self::Patient,
            "created_at" | "createdAt" => Self::CreatedAt,
            _ => Self::Date,
        }
    }
}

#[derive(Debug, Default)]
pub struct ReportFilter {
    /// Case-insensitive substring over date and health status.
    pub search: Option<String>,
    pub patient_id: Option<Uuid>,
    pub staff_id: Option<Uuid>,
    pub sort_key: ReportSortKey,
    pub sort_order: Option<SortOrder>,
    pub page: u32,
    pub page_size: Option<u32>,
}
