//! User-facing strings. The site is rendered right-to-left in Arabic.

pub const LOADING_SITE: &str = "جاري تحميل الموقع...";
pub const LOADING_POSTS: &str = "جاري تحميل المقالات...";
pub const NO_POSTS_PUBLIC: &str = "لا توجد مقالات منشورة بعد.";
pub const POSTS_UNAVAILABLE: &str = "تعذر تحميل المقالات. يرجى تحديث الصفحة لاحقاً.";
pub const NO_POSTS_ADMIN: &str = "لا توجد مقالات منشورة بعد. ابدأ بإضافة مقالة جديدة!";

pub const LOGIN_FAILED: &str = "فشل تسجيل الدخول. يرجى التحقق من البريد الإلكتروني وكلمة المرور.";
pub const LOGIN_DISABLED: &str = "تم تعطيل هذا الحساب. يرجى التواصل مع مدير الموقع.";
pub const LOGIN_UNAVAILABLE: &str = "تعذر الاتصال بخدمة تسجيل الدخول. يرجى المحاولة لاحقاً.";

pub const TITLE_AND_CONTENT_REQUIRED: &str = "الرجاء إدخال عنوان ومحتوى للمقالة.";
pub const SELECT_POST_TO_EDIT: &str = "الرجاء تحديد مقالة للتعديل وإدخال عنوان ومحتوى.";
pub const FINISH_EDITING_FIRST: &str = "الرجاء إنهاء تعديل المقالة الحالية أو إلغاؤه أولاً.";
pub const ADMIN_REQUIRED: &str = "هذه العملية متاحة للمدير فقط.";
pub const SESSION_CHANGED: &str = "تغيرت جلسة المستخدم أثناء تنفيذ العملية.";

pub const POST_CREATED: &str = "تمت إضافة المقالة بنجاح!";
pub const POST_UPDATED: &str = "تم تحديث المقالة بنجاح!";
pub const POST_DELETED: &str = "تم حذف المقالة بنجاح!";

pub const CREATE_FAILED: &str = "حدث خطأ أثناء إضافة المقالة.";
pub const UPDATE_FAILED: &str = "حدث خطأ أثناء تحديث المقالة.";
pub const DELETE_FAILED: &str = "حدث خطأ أثناء حذف المقالة.";

pub const UNEXPECTED_ERROR: &str = "حدث خطأ غير متوقع. يرجى المحاولة لاحقاً.";

pub const CONFIRM_DELETE: &str = "هل أنت متأكد أنك تريد حذف هذه المقالة؟";

pub const PUBLISHED_ON: &str = "تاريخ النشر";
pub const DATE_NOT_AVAILABLE: &str = "غير متوفر";
