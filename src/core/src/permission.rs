//! Closed permission vocabulary.
//!
//! Permission keys are a fixed enum rather than free-form strings: role
//! templates and grant overrides may only reference keys from this list, so a
//! typo in a role definition is a compile/parse error instead of a silently
//! never-granted flag.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when parsing an unknown permission key.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown permission key: {0}")]
pub struct PermissionParseError(pub String);

/// A permission flag that a role can grant or deny.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    // Organization management
    CanManageCompany,
    CanManageDepartments,
    CanManageBranches,

    // Employee management
    CanCreateEmployee,
    CanEditEmployee,
    CanTerminateEmployee,
    CanViewAllEmployees,

    // Sensitive data
    CanViewSalary,
    CanEditSalary,
    CanViewBankDetails,

    // Time & attendance
    CanApproveLeave,
    CanEditAttendance,
    CanViewTeamAttendance,

    // Payroll
    CanProcessPayroll,
    CanViewPayroll,

    // Reports
    CanViewReports,
    CanExportData,

    // System administration
    CanManageRoles,
    CanManagePermissions,
    CanViewAuditLogs,
}

impl Permission {
    /// All permission keys, in declaration order.
    pub const ALL: [Permission; 20] = [
        Permission::CanManageCompany,
        Permission::CanManageDepartments,
        Permission::CanManageBranches,
        Permission::CanCreateEmployee,
        Permission::CanEditEmployee,
        Permission::CanTerminateEmployee,
        Permission::CanViewAllEmployees,
        Permission::CanViewSalary,
        Permission::CanEditSalary,
        Permission::CanViewBankDetails,
        Permission::CanApproveLeave,
        Permission::CanEditAttendance,
        Permission::CanViewTeamAttendance,
        Permission::CanProcessPayroll,
        Permission::CanViewPayroll,
        Permission::CanViewReports,
        Permission::CanExportData,
        Permission::CanManageRoles,
        Permission::CanManagePermissions,
        Permission::CanViewAuditLogs,
    ];

    /// The stored/wire form of the key (snake_case).
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::CanManageCompany => "can_manage_company",
            Permission::CanManageDepartments => "can_manage_departments",
            Permission::CanManageBranches => "can_manage_branches",
            Permission::CanCreateEmployee => "can_create_employee",
            Permission::CanEditEmployee => "can_edit_employee",
            Permission::CanTerminateEmployee => "can_terminate_employee",
            Permission::CanViewAllEmployees => "can_view_all_employees",
            Permission::CanViewSalary => "can_view_salary",
            Permission::CanEditSalary => "can_edit_salary",
            Permission::CanViewBankDetails => "can_view_bank_details",
            Permission::CanApproveLeave => "can_approve_leave",
            Permission::CanEditAttendance => "can_edit_attendance",
            Permission::CanViewTeamAttendance => "can_view_team_attendance",
            Permission::CanProcessPayroll => "can_process_payroll",
            Permission::CanViewPayroll => "can_view_payroll",
            Permission::CanViewReports => "can_view_reports",
            Permission::CanExportData => "can_export_data",
            Permission::CanManageRoles => "can_manage_roles",
            Permission::CanManagePermissions => "can_manage_permissions",
            Permission::CanViewAuditLogs => "can_view_audit_logs",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = PermissionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .find(|p| p.as_str() == s)
            .copied()
            .ok_or_else(|| PermissionParseError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_string_form() {
        for p in Permission::ALL {
            assert_eq!(Permission::from_str(p.as_str()).unwrap(), p);
        }
    }

    #[test]
    fn rejects_unknown_key() {
        let err = Permission::from_str("can_fly").unwrap_err();
        assert_eq!(err.0, "can_fly");
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&Permission::CanViewSalary).unwrap();
        assert_eq!(json, "\"can_view_salary\"");

        let back: Permission = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Permission::CanViewSalary);
    }

    #[test]
    fn all_list_is_complete_and_unique() {
        use std::collections::HashSet;
        let set: HashSet<&str> = Permission::ALL.iter().map(|p| p.as_str()).collect();
        assert_eq!(set.len(), Permission::ALL.len());
    }
}
