//! 組み込みのリモートリポジトリ一覧。
//! 順序がそのままホスト探索の試行順になる。

pub(crate) struct DefaultRepository {
    pub name: &'static str,
    pub url: &'static str,
}

pub(crate) const DEFAULT_REPOSITORIES: &[DefaultRepository] = &[
    DefaultRepository {
        name: "maven-central",
        url: "https://repo1.maven.org/maven2",
    },
    DefaultRepository {
        name: "google",
        url: "https://maven.google.com",
    },
    DefaultRepository {
        name: "jitpack",
        url: "https://jitpack.io",
    },
];
