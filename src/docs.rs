use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use classdesk_core::{PaginationMeta, PaginationParams};
use classdesk_models::academic_sessions::{
    AcademicSession, AcademicSessionWithStats, CreateSessionDto, UpdateSessionDto,
};
use classdesk_models::attendance::{
    Attendance, AttendanceRecordDto, AttendanceStatus, AttendanceSummary, AttendanceWithStudent,
    BulkAttendanceDto, BulkAttendanceResponse,
};
use classdesk_models::audit::AuditLog;
use classdesk_models::auth::{
    ChangePasswordRequest, CsrfTokenResponse, LoginRequest, LoginResponse, LogoutRequest,
    MessageResponse, RefreshTokenRequest, TokenResponse,
};
use classdesk_models::classrooms::{
    AssignSubjectDto, Classroom, ClassroomSubject, ClassroomWithStats, CreateClassroomDto,
    UpdateClassroomDto,
};
use classdesk_models::fees::{
    ClassroomSyncError, CreateFeeStructureDto, FeePayment, FeeStatus, FeeStructure,
    FeeSyncBatchError, FeeSyncReport, FeeVerification, PaymentMethod, PaymentReceipt,
    RecordPaymentDto, StudentFee, StudentFeeDetails, StudentFeeLedger, SyncFeesDto,
    UpdateFeeStructureDto,
};
use classdesk_models::portal::{AdminDashboard, TeacherClass};
use classdesk_models::results::{
    BulkResultsDto, BulkResultsResponse, Grade, ReportCard, ResultEntryDto, ResultWithSubject,
    StudentResult,
};
use classdesk_models::students::{
    CreateStudentDto, Gender, LinkParentDto, Student, StudentStatus, UpdateStudentDto,
};
use classdesk_models::subjects::{CreateSubjectDto, Subject, UpdateSubjectDto};
use classdesk_models::terms::{CreateTermDto, Term, UpdateTermDto};
use classdesk_models::timetables::{
    CreateTimetableEntryDto, TimetableEntry, TimetableEntryDetails, UpdateTimetableEntryDto,
};
use classdesk_models::users::{CreateUserDto, ResetPasswordDto, UpdateUserDto, User, UserRole};

use crate::modules::auth::controller::ErrorResponse;
use crate::modules::health::controller::HealthResponse;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::health::controller::health_check,
        crate::modules::auth::controller::get_csrf_token,
        crate::modules::auth::controller::login,
        crate::modules::auth::controller::refresh_token,
        crate::modules::auth::controller::logout,
        crate::modules::auth::controller::get_me,
        crate::modules::auth::controller::change_password,
        crate::modules::users::controller::create_user,
        crate::modules::users::controller::get_users,
        crate::modules::users::controller::get_user,
        crate::modules::users::controller::update_user,
        crate::modules::users::controller::delete_user,
        crate::modules::users::controller::unlock_user,
        crate::modules::users::controller::reset_password,
        crate::modules::students::controller::create_student,
        crate::modules::students::controller::get_students,
        crate::modules::students::controller::get_student,
        crate::modules::students::controller::update_student,
        crate::modules::students::controller::delete_student,
        crate::modules::students::controller::link_parent,
        crate::modules::classrooms::controller::create_classroom,
        crate::modules::classrooms::controller::get_classrooms,
        crate::modules::classrooms::controller::get_classroom,
        crate::modules::classrooms::controller::update_classroom,
        crate::modules::classrooms::controller::delete_classroom,
        crate::modules::classrooms::controller::get_classroom_students,
        crate::modules::classrooms::controller::get_classroom_subjects,
        crate::modules::classrooms::controller::assign_subject,
        crate::modules::classrooms::controller::remove_subject,
        crate::modules::subjects::controller::create_subject,
        crate::modules::subjects::controller::get_subjects,
        crate::modules::subjects::controller::get_subject,
        crate::modules::subjects::controller::update_subject,
        crate::modules::subjects::controller::delete_subject,
        crate::modules::academic_sessions::controller::create_session,
        crate::modules::academic_sessions::controller::get_sessions,
        crate::modules::academic_sessions::controller::get_current_session,
        crate::modules::academic_sessions::controller::get_session,
        crate::modules::academic_sessions::controller::update_session,
        crate::modules::academic_sessions::controller::delete_session,
        crate::modules::academic_sessions::controller::set_current_session,
        crate::modules::terms::controller::create_session_term,
        crate::modules::terms::controller::get_session_terms,
        crate::modules::terms::controller::get_current_term,
        crate::modules::terms::controller::get_term,
        crate::modules::terms::controller::update_term,
        crate::modules::terms::controller::delete_term,
        crate::modules::terms::controller::set_current_term,
        crate::modules::attendance::controller::record_bulk_attendance,
        crate::modules::attendance::controller::get_attendance,
        crate::modules::attendance::controller::get_attendance_summary,
        crate::modules::timetables::controller::create_timetable_entry,
        crate::modules::timetables::controller::get_timetable,
        crate::modules::timetables::controller::update_timetable_entry,
        crate::modules::timetables::controller::delete_timetable_entry,
        crate::modules::fees::controller::create_fee_structure,
        crate::modules::fees::controller::get_fee_structures,
        crate::modules::fees::controller::get_fee_structure,
        crate::modules::fees::controller::update_fee_structure,
        crate::modules::fees::controller::delete_fee_structure,
        crate::modules::fees::controller::get_student_fees,
        crate::modules::fees::controller::record_payment,
        crate::modules::fees::controller::get_payments,
        crate::modules::fees::controller::verify_fee_pin,
        crate::modules::fees::controller::sync_classroom_fees,
        crate::modules::fees::controller::sync_all_fees,
        crate::modules::results::controller::record_results,
        crate::modules::results::controller::get_results,
        crate::modules::results::controller::get_report_card,
        crate::modules::results::controller::delete_result,
        crate::modules::audit_logs::controller::get_audit_logs,
        crate::modules::portal::controller::admin_dashboard,
        crate::modules::portal::controller::teacher_classes,
        crate::modules::portal::controller::teacher_timetable,
        crate::modules::portal::controller::student_profile,
        crate::modules::portal::controller::student_results,
        crate::modules::portal::controller::student_attendance,
        crate::modules::portal::controller::student_fees,
        crate::modules::portal::controller::student_timetable,
        crate::modules::portal::controller::parent_children,
        crate::modules::portal::controller::child_results,
        crate::modules::portal::controller::child_attendance,
        crate::modules::portal::controller::child_fees,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            PaginationMeta,
            PaginationParams,
            LoginRequest,
            LoginResponse,
            TokenResponse,
            RefreshTokenRequest,
            LogoutRequest,
            ChangePasswordRequest,
            MessageResponse,
            CsrfTokenResponse,
            User,
            UserRole,
            CreateUserDto,
            UpdateUserDto,
            ResetPasswordDto,
            Student,
            StudentStatus,
            Gender,
            CreateStudentDto,
            UpdateStudentDto,
            LinkParentDto,
            Classroom,
            ClassroomWithStats,
            CreateClassroomDto,
            UpdateClassroomDto,
            ClassroomSubject,
            AssignSubjectDto,
            Subject,
            CreateSubjectDto,
            UpdateSubjectDto,
            AcademicSession,
            AcademicSessionWithStats,
            CreateSessionDto,
            UpdateSessionDto,
            Term,
            CreateTermDto,
            UpdateTermDto,
            Attendance,
            AttendanceStatus,
            AttendanceWithStudent,
            AttendanceRecordDto,
            BulkAttendanceDto,
            BulkAttendanceResponse,
            AttendanceSummary,
            TimetableEntry,
            TimetableEntryDetails,
            CreateTimetableEntryDto,
            UpdateTimetableEntryDto,
            FeeStatus,
            PaymentMethod,
            FeeStructure,
            CreateFeeStructureDto,
            UpdateFeeStructureDto,
            StudentFee,
            StudentFeeDetails,
            StudentFeeLedger,
            FeeVerification,
            FeePayment,
            RecordPaymentDto,
            PaymentReceipt,
            SyncFeesDto,
            FeeSyncBatchError,
            ClassroomSyncError,
            FeeSyncReport,
            Grade,
            StudentResult,
            ResultWithSubject,
            ResultEntryDto,
            BulkResultsDto,
            BulkResultsResponse,
            ReportCard,
            AuditLog,
            AdminDashboard,
            TeacherClass,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Authentication", description = "Login, token rotation and logout"),
        (name = "Users", description = "Account administration"),
        (name = "Students", description = "Student enrollment and records"),
        (name = "Classrooms", description = "Classrooms and subject assignments"),
        (name = "Subjects", description = "Subject catalogue"),
        (name = "Academic Sessions", description = "School years"),
        (name = "Terms", description = "Terms within a session"),
        (name = "Attendance", description = "Daily registers"),
        (name = "Timetables", description = "Weekly timetable"),
        (name = "Fees", description = "Fee structures, payments and synchronization"),
        (name = "Results", description = "Scores, grades and report cards"),
        (name = "Audit Logs", description = "Audit trail"),
        (name = "Portal", description = "Role-scoped dashboards")
    ),
    info(
        title = "ClassDesk API",
        version = "0.1.0",
        description = "School management REST API built with Rust, Axum and PostgreSQL.",
        license(
            name = "MIT"
        )
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}
