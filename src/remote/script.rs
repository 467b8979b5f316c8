use crate::config::SiteConfig;

pub const SCRIPT_NAME: &str = "remote_script.sh";
pub const EXTRACT_DIR: &str = "extracted_images";

/// Quote `s` for a POSIX shell: single quotes, embedded quotes as `'\''`.
pub fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s.chars().all(|c| c.is_ascii_alphanumeric() || "/._-+=:@,".contains(c))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Inputs of the remote extract+import step. Running the rendered script
/// with bash is expected to exit 0 once the media import succeeded; the
/// script removes `temp_dir` on exit either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportJob {
    pub temp_dir: String,
    pub archive_name: String,
    pub wp_path: String,
    pub wp_author: String,
    pub web_user: String,
    pub wp_cli: String,
}

impl ImportJob {
    pub fn for_site(site: &SiteConfig, temp_dir: String, archive_name: &str) -> Self {
        Self {
            temp_dir,
            archive_name: archive_name.to_string(),
            wp_path: site.wp_path.clone(),
            wp_author: site.wp_author.clone(),
            web_user: site.web_user().to_string(),
            wp_cli: site.wp_cli().to_string(),
        }
    }

    pub fn archive_path(&self) -> String {
        format!("{}/{}", self.temp_dir, self.archive_name)
    }

    pub fn script_path(&self) -> String {
        format!("{}/{}", self.temp_dir, SCRIPT_NAME)
    }

    pub fn run_command(&self) -> String {
        format!("bash {}", shell_quote(&self.script_path()))
    }

    pub fn render(&self) -> String {
        let dir = shell_quote(&self.temp_dir);
        // the glob must stay outside quotes
        let images = format!("{}/{}/*.{{webp,jpg,png}}", dir, EXTRACT_DIR);
        let author = shell_quote(&self.wp_author);
        [
            "#!/bin/bash".to_string(),
            "set -e".to_string(),
            "shopt -s nullglob".to_string(),
            String::new(),
            "cleanup() {".to_string(),
            format!("  rm -rf {}", dir),
            "}".to_string(),
            "trap cleanup EXIT".to_string(),
            String::new(),
            format!("chmod 755 {}", dir),
            format!("cd {}", dir),
            format!("unzip -o {} -d {}", shell_quote(&self.archive_name), EXTRACT_DIR),
            format!("chmod -R 755 {}", EXTRACT_DIR),
            String::new(),
            format!(
                "echo {}",
                shell_quote(&format!("Importing into {} as {}", self.wp_path, self.wp_author))
            ),
            format!("cd {}", shell_quote(&self.wp_path)),
            format!(
                "sudo -u {} {} media import {} --user={}",
                shell_quote(&self.web_user),
                shell_quote(&self.wp_cli),
                images,
                author
            ),
            String::new(),
        ]
        .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> ImportJob {
        ImportJob {
            temp_dir: "/tmp/upload_s_1_2".into(),
            archive_name: "KTB batch.zip".into(),
            wp_path: "/var/www/html".into(),
            wp_author: "bot".into(),
            web_user: "nginx".into(),
            wp_cli: "/usr/local/bin/wp".into(),
        }
    }

    #[test]
    fn quote_cases() {
        assert_eq!(shell_quote("/tmp/a_b-1.zip"), "/tmp/a_b-1.zip");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("$(rm -rf /)"), "'$(rm -rf /)'");
    }

    #[test]
    fn paths() {
        let j = job();
        assert_eq!(j.archive_path(), "/tmp/upload_s_1_2/KTB batch.zip");
        assert_eq!(j.script_path(), "/tmp/upload_s_1_2/remote_script.sh");
        assert_eq!(j.run_command(), "bash /tmp/upload_s_1_2/remote_script.sh");
    }

    #[test]
    fn script_extracts_then_imports_with_sudo() {
        let s = job().render();
        assert!(s.starts_with("#!/bin/bash\nset -e\n"));
        assert!(s.contains("trap cleanup EXIT"));
        assert!(s.contains("unzip -o 'KTB batch.zip' -d extracted_images"));
        assert!(s.contains(
            "sudo -u nginx /usr/local/bin/wp media import /tmp/upload_s_1_2/extracted_images/*.{webp,jpg,png} --user=bot"
        ));
        let unzip = s.find("unzip").unwrap();
        let import = s.find("media import").unwrap();
        assert!(unzip < import);
    }
}
