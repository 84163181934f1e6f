//! `multipart/form-data` bodies for filing submissions.

/// A file attached to a filing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilePart {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Text fields plus files, sent as one multipart request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilingSubmission {
    pub fields: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

impl FilingSubmission {
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn file(mut self, part: FilePart) -> Self {
        self.files.push(part);
        self
    }

    /// Encode with a fresh random boundary; returns `(content_type, body)`.
    pub fn encode(&self) -> (String, Vec<u8>) {
        let boundary = format!("covermap-{:032x}", rand::random::<u128>());
        let body = self.encode_with_boundary(&boundary);
        (format!("multipart/form-data; boundary={boundary}"), body)
    }

    pub(crate) fn encode_with_boundary(&self, boundary: &str) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in &self.fields {
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                    escape_quoted(name)
                )
                .as_bytes(),
            );
            body.extend_from_slice(value.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        for file in &self.files {
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                    escape_quoted(&file.file_name)
                )
                .as_bytes(),
            );
            body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", file.content_type).as_bytes());
            body.extend_from_slice(&file.bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        body
    }
}

fn escape_quoted(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_fields_then_files() {
        let submission = FilingSubmission::default()
            .field("provider_id", "130077")
            .file(FilePart {
                file_name: "fiber \"east\".csv".to_string(),
                content_type: "text/csv".to_string(),
                bytes: b"a,b\n1,2\n".to_vec(),
            });
        let body = String::from_utf8(submission.encode_with_boundary("XYZ")).unwrap();
        assert_eq!(
            body,
            "--XYZ\r\nContent-Disposition: form-data; name=\"provider_id\"\r\n\r\n130077\r\n\
             --XYZ\r\nContent-Disposition: form-data; name=\"file\"; filename=\"fiber \\\"east\\\".csv\"\r\n\
             Content-Type: text/csv\r\n\r\na,b\n1,2\n\r\n--XYZ--\r\n"
        );
    }

    #[test]
    fn content_type_carries_boundary() {
        let (content_type, body) = FilingSubmission::default().field("a", "b").encode();
        let boundary = content_type
            .strip_prefix("multipart/form-data; boundary=")
            .unwrap();
        assert!(String::from_utf8(body).unwrap().ends_with(&format!("--{boundary}--\r\n")));
    }
}
