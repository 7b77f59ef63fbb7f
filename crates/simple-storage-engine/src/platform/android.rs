//! Android Storage Access Framework store
//!
//! Talks to `DocumentsContract` and `ContentResolver` over JNI. Relies on the
//! Android context published through `ndk-context`, which native activities
//! and Rust Android app shells set up at startup.

use crate::grants::TreeProvider;
use crate::platform::close_after;
use crate::store::{
    Document, DocumentId, FsStats, NodeKind, StoreError, TreeStore, validate_name,
};
use crate::uri::encode_component;
use jni::objects::{JObject, JString, JValue};
use jni::{JNIEnv, JavaVM};
use std::sync::Arc;

const DOCUMENTS_CONTRACT: &str = "android/provider/DocumentsContract";
const MIME_TYPE_DIR: &str = "vnd.android.document/directory";
const PROJECTION: [&str; 3] = ["document_id", "_display_name", "mime_type"];
const LOCAL_FRAME_CAPACITY: i32 = 32;

/// Opens SAF trees the app holds a (persisted) URI grant for.
#[derive(Debug, Default)]
pub struct SafProvider;

impl TreeProvider for SafProvider {
    fn open_tree(
        &self,
        storage_id: &str,
        tree_uri: &str,
    ) -> Result<Arc<dyn TreeStore>, StoreError> {
        let store = SafStore::open(tree_uri)?;
        log::debug!("Opened SAF tree for storage {storage_id}");
        Ok(Arc::new(store))
    }
}

/// One SAF tree. Document ids are the provider's own document ids.
#[derive(Debug, Clone)]
pub struct SafStore {
    tree_uri: String,
    root_id: String,
}

impl SafStore {
    /// Open a tree, failing with [`StoreError::PermissionDenied`] when the
    /// app holds no grant for it.
    pub fn open(tree_uri: &str) -> Result<Self, StoreError> {
        let root_id = with_jni(|env, _context| {
            let tree = parse_uri(env, tree_uri)?;
            let id = env
                .call_static_method(
                    DOCUMENTS_CONTRACT,
                    "getTreeDocumentId",
                    "(Landroid/net/Uri;)Ljava/lang/String;",
                    &[JValue::Object(&tree)],
                )?
                .l()?;
            required_string(env, id, "tree document id")
        })?;

        let store = Self {
            tree_uri: tree_uri.to_string(),
            root_id,
        };
        store.root()?;
        Ok(store)
    }

    fn document(&self, id: &str) -> Result<Document, StoreError> {
        let documents = with_jni(|env, context| {
            let tree = parse_uri(env, &self.tree_uri)?;
            let uri = build_uri(env, "buildDocumentUriUsingTree", &tree, id)?;
            query_documents(env, context, &uri)
        })?;
        documents
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn create_document(
        &self,
        parent: &DocumentId,
        mime_type: &str,
        name: &str,
    ) -> Result<Document, StoreError> {
        validate_name(name)?;
        let created_id = with_jni(|env, context| {
            let tree = parse_uri(env, &self.tree_uri)?;
            let parent_uri = build_uri(env, "buildDocumentUriUsingTree", &tree, parent.as_str())?;
            let resolver = content_resolver(env, context)?;
            let mime_type: JObject = env.new_string(mime_type)?.into();
            let display_name: JObject = env.new_string(name)?.into();

            let created = env
                .call_static_method(
                    DOCUMENTS_CONTRACT,
                    "createDocument",
                    "(Landroid/content/ContentResolver;Landroid/net/Uri;Ljava/lang/String;Ljava/lang/String;)Landroid/net/Uri;",
                    &[
                        JValue::Object(&resolver),
                        JValue::Object(&parent_uri),
                        JValue::Object(&mime_type),
                        JValue::Object(&display_name),
                    ],
                )?
                .l()?;
            if created.is_null() {
                return Err(StoreError::Platform(format!("provider refused to create {name:?}")).into());
            }

            let id = env
                .call_static_method(
                    DOCUMENTS_CONTRACT,
                    "getDocumentId",
                    "(Landroid/net/Uri;)Ljava/lang/String;",
                    &[JValue::Object(&created)],
                )?
                .l()?;
            required_string(env, id, "created document id")
        })?;

        // The provider may have picked a different display name
        self.document(&created_id)
    }
}

impl TreeStore for SafStore {
    fn root(&self) -> Result<Document, StoreError> {
        self.document(&self.root_id)
    }

    fn children(&self, parent: &DocumentId) -> Result<Vec<Document>, StoreError> {
        with_jni(|env, context| {
            let tree = parse_uri(env, &self.tree_uri)?;
            let uri = build_uri(env, "buildChildDocumentsUriUsingTree", &tree, parent.as_str())?;
            query_documents(env, context, &uri)
        })
    }

    fn create_directory(&self, parent: &DocumentId, name: &str) -> Result<Document, StoreError> {
        self.create_document(parent, MIME_TYPE_DIR, name)
    }

    fn create_file(
        &self,
        parent: &DocumentId,
        name: &str,
        mime_type: &str,
    ) -> Result<Document, StoreError> {
        self.create_document(parent, mime_type, name)
    }

    fn delete(&self, id: &DocumentId) -> Result<(), StoreError> {
        if id.as_str() == self.root_id {
            return Err(StoreError::Unsupported("cannot delete the tree root".into()));
        }
        let deleted = with_jni(|env, context| {
            let tree = parse_uri(env, &self.tree_uri)?;
            let uri = build_uri(env, "buildDocumentUriUsingTree", &tree, id.as_str())?;
            let resolver = content_resolver(env, context)?;
            Ok(env
                .call_static_method(
                    DOCUMENTS_CONTRACT,
                    "deleteDocument",
                    "(Landroid/content/ContentResolver;Landroid/net/Uri;)Z",
                    &[JValue::Object(&resolver), JValue::Object(&uri)],
                )?
                .z()?)
        })?;
        if !deleted {
            return Err(StoreError::Platform(format!("provider refused to delete {id}")));
        }
        Ok(())
    }

    fn stat_fs(&self) -> Result<FsStats, StoreError> {
        with_jni(|env, context| {
            let tree = parse_uri(env, &self.tree_uri)?;
            let uri = build_uri(env, "buildDocumentUriUsingTree", &tree, &self.root_id)?;
            let resolver = content_resolver(env, context)?;
            let mode: JObject = env.new_string("r")?.into();

            let descriptor = env
                .call_method(
                    &resolver,
                    "openFileDescriptor",
                    "(Landroid/net/Uri;Ljava/lang/String;)Landroid/os/ParcelFileDescriptor;",
                    &[JValue::Object(&uri), JValue::Object(&mode)],
                )?
                .l()?;
            if descriptor.is_null() {
                return Err(StoreError::NotFound(self.tree_uri.clone()).into());
            }

            closing(env, &descriptor, |env| {
                let fd = env
                    .call_method(&descriptor, "getFileDescriptor", "()Ljava/io/FileDescriptor;", &[])?
                    .l()?;
                let stats = env
                    .call_static_method(
                        "android/system/Os",
                        "fstatvfs",
                        "(Ljava/io/FileDescriptor;)Landroid/system/StructStatVfs;",
                        &[JValue::Object(&fd)],
                    )?
                    .l()?;

                let block_size = env.get_field(&stats, "f_frsize", "J")?.j()?;
                let blocks = env.get_field(&stats, "f_blocks", "J")?.j()?;
                let available_blocks = env.get_field(&stats, "f_bavail", "J")?.j()?;

                Ok(FsStats {
                    block_size: u64::try_from(block_size).unwrap_or(0),
                    blocks: u64::try_from(blocks).unwrap_or(0),
                    available_blocks: u64::try_from(available_blocks).unwrap_or(0),
                })
            })
        })
    }

    fn document_uri(&self, id: &DocumentId) -> String {
        format!("{}/document/{}", self.tree_uri, encode_component(id.as_str()))
    }
}

/// Failure inside a JNI call sequence: either a raw JNI error (usually a
/// pending Java exception) or an already classified store error.
enum CallError {
    Jni(jni::errors::Error),
    Store(StoreError),
}

impl From<jni::errors::Error> for CallError {
    fn from(error: jni::errors::Error) -> Self {
        CallError::Jni(error)
    }
}

impl From<StoreError> for CallError {
    fn from(error: StoreError) -> Self {
        CallError::Store(error)
    }
}

type CallResult<T> = Result<T, CallError>;

/// Run JNI calls on this thread inside a local reference frame, turning
/// pending Java exceptions into store errors.
fn with_jni<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce(&mut JNIEnv, &JObject) -> CallResult<T>,
{
    let ctx = ndk_context::android_context();
    let vm = unsafe { JavaVM::from_raw(ctx.vm().cast()) }
        .map_err(|e| StoreError::Platform(format!("JavaVM unavailable: {e}")))?;
    let mut env = vm
        .attach_current_thread()
        .map_err(|e| StoreError::Platform(format!("cannot attach thread: {e}")))?;
    let context = unsafe { JObject::from_raw(ctx.context().cast()) };

    let result = env.with_local_frame(LOCAL_FRAME_CAPACITY, |env| f(env, &context));
    match result {
        Ok(value) => Ok(value),
        Err(CallError::Store(e)) => Err(e),
        Err(CallError::Jni(e)) => Err(classify(&mut env, e)),
    }
}

fn classify(env: &mut JNIEnv, error: jni::errors::Error) -> StoreError {
    if !matches!(error, jni::errors::Error::JavaException) {
        return StoreError::Platform(error.to_string());
    }
    let throwable = match env.exception_occurred() {
        Ok(throwable) => throwable,
        Err(e) => return StoreError::Platform(e.to_string()),
    };
    let _ = env.exception_clear();

    let message = describe(env, &throwable);
    log::debug!("Java exception: {message}");
    if is_instance(env, &throwable, "java/lang/SecurityException") {
        StoreError::PermissionDenied(message)
    } else if is_instance(env, &throwable, "java/io/FileNotFoundException") {
        StoreError::NotFound(message)
    } else if is_instance(env, &throwable, "java/io/IOException")
        || is_instance(env, &throwable, "android/system/ErrnoException")
    {
        StoreError::Io(std::io::Error::other(message))
    } else {
        StoreError::Platform(message)
    }
}

fn is_instance(env: &mut JNIEnv, object: &JObject, class: &str) -> bool {
    env.is_instance_of(object, class).unwrap_or(false)
}

fn describe(env: &mut JNIEnv, throwable: &JObject) -> String {
    let described = env
        .call_method(throwable, "toString", "()Ljava/lang/String;", &[])
        .and_then(|value| value.l());
    match described {
        Ok(value) if !value.is_null() => {
            let value = JString::from(value);
            env.get_string(&value)
                .map(String::from)
                .unwrap_or_else(|_| "Java exception".to_string())
        }
        _ => {
            let _ = env.exception_clear();
            "Java exception".to_string()
        }
    }
}

fn parse_uri<'local>(env: &mut JNIEnv<'local>, uri: &str) -> CallResult<JObject<'local>> {
    let uri: JObject = env.new_string(uri)?.into();
    Ok(env
        .call_static_method(
            "android/net/Uri",
            "parse",
            "(Ljava/lang/String;)Landroid/net/Uri;",
            &[JValue::Object(&uri)],
        )?
        .l()?)
}

fn build_uri<'local>(
    env: &mut JNIEnv<'local>,
    method: &str,
    tree: &JObject,
    document_id: &str,
) -> CallResult<JObject<'local>> {
    let document_id: JObject = env.new_string(document_id)?.into();
    Ok(env
        .call_static_method(
            DOCUMENTS_CONTRACT,
            method,
            "(Landroid/net/Uri;Ljava/lang/String;)Landroid/net/Uri;",
            &[JValue::Object(tree), JValue::Object(&document_id)],
        )?
        .l()?)
}

fn content_resolver<'local>(
    env: &mut JNIEnv<'local>,
    context: &JObject,
) -> CallResult<JObject<'local>> {
    Ok(env
        .call_method(
            context,
            "getContentResolver",
            "()Landroid/content/ContentResolver;",
            &[],
        )?
        .l()?)
}

fn query_documents<'local>(
    env: &mut JNIEnv<'local>,
    context: &JObject,
    uri: &JObject,
) -> CallResult<Vec<Document>> {
    let resolver = content_resolver(env, context)?;
    let projection = env.new_object_array(PROJECTION.len() as i32, "java/lang/String", JObject::null())?;
    for (index, column) in PROJECTION.iter().enumerate() {
        let column = env.new_string(column)?;
        env.set_object_array_element(&projection, index as i32, column)?;
    }
    let projection: JObject = projection.into();
    let null = JObject::null();

    let cursor = env
        .call_method(
            &resolver,
            "query",
            "(Landroid/net/Uri;[Ljava/lang/String;Ljava/lang/String;[Ljava/lang/String;Ljava/lang/String;)Landroid/database/Cursor;",
            &[
                JValue::Object(uri),
                JValue::Object(&projection),
                JValue::Object(&null),
                JValue::Object(&null),
                JValue::Object(&null),
            ],
        )?
        .l()?;
    if cursor.is_null() {
        return Err(StoreError::NotFound("provider returned no cursor".into()).into());
    }

    closing(env, &cursor, |env| read_rows(env, &cursor))
}

/// Run `body`, then call `close()` on `resource` whatever the outcome. A Java
/// exception raised by `body` stays pending for [`classify`].
fn closing<'local, T, F>(env: &mut JNIEnv<'local>, resource: &JObject, body: F) -> CallResult<T>
where
    F: FnOnce(&mut JNIEnv<'local>) -> CallResult<T>,
{
    close_after(env, body, |env| {
        let pending = env.exception_occurred().ok().filter(|throwable| !throwable.is_null());
        if pending.is_some() {
            let _ = env.exception_clear();
        }
        if let Err(e) = env.call_method(resource, "close", "()V", &[]) {
            log::warn!("Closing a provider resource failed: {e}");
            let _ = env.exception_clear();
        }
        if let Some(throwable) = pending {
            if let Err(e) = env.throw(throwable) {
                log::warn!("Restoring a provider exception failed: {e}");
            }
        }
    })
}

fn read_rows(env: &mut JNIEnv, cursor: &JObject) -> CallResult<Vec<Document>> {
    let mut documents = Vec::new();
    while env.call_method(cursor, "moveToNext", "()Z", &[])?.z()? {
        let id = cursor_string(env, cursor, 0)?;
        let name = cursor_string(env, cursor, 1)?;
        let mime_type = cursor_string(env, cursor, 2)?;
        let Some(id) = id else { continue };

        let kind = if mime_type.as_deref() == Some(MIME_TYPE_DIR) {
            NodeKind::Directory
        } else {
            NodeKind::File
        };
        documents.push(Document {
            id: DocumentId::new(id),
            name: name.unwrap_or_default(),
            kind,
            mime_type: mime_type.filter(|_| kind == NodeKind::File),
        });
    }
    Ok(documents)
}

fn cursor_string(env: &mut JNIEnv, cursor: &JObject, column: i32) -> CallResult<Option<String>> {
    let value = env
        .call_method(cursor, "getString", "(I)Ljava/lang/String;", &[JValue::Int(column)])?
        .l()?;
    if value.is_null() {
        return Ok(None);
    }
    let value = JString::from(value);
    let text: String = env.get_string(&value)?.into();
    env.delete_local_ref(value)?;
    Ok(Some(text))
}

fn required_string(env: &mut JNIEnv, value: JObject, what: &str) -> CallResult<String> {
    if value.is_null() {
        return Err(StoreError::Platform(format!("provider returned no {what}")).into());
    }
    let value = JString::from(value);
    Ok(env.get_string(&value)?.into())
}
