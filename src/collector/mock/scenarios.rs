//! Pre-built host scenarios for testing.
//!
//! A small web server: nginx and sshd listening, two containers, two site
//! files and three accounts.

use std::sync::Arc;

use super::filesystem::MockFs;
use super::runner::MockRunner;
use crate::collector::aggregator::Aggregator;
use crate::collector::docker::{DOCKER, DockerCollector, IMAGES_ARGS, PS_ARGS};
use crate::collector::nginx::NginxCollector;
use crate::collector::ports::PortCollector;
use crate::collector::users::{LASTLOG, UserCollector};

pub const NGINX_DIR: &str = "/etc/nginx/sites-enabled";

impl MockFs {
    /// Filesystem of a typical web host.
    ///
    /// Sockets: nginx (pid 812) on 80 and 443, sshd (pid 640) on 22 with
    /// one established session, a resolver on udp 53 without a visible
    /// owner.
    pub fn typical_host() -> Self {
        let mut fs = Self::new();

        fs.add_file(
            "/proc/net/tcp",
            "\
  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000:0050 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 21001 1 0000000000000000 100 0 0 10 0
   1: 00000000:01BB 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 21002 1 0000000000000000 100 0 0 10 0
   2: 00000000:0016 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 18001 1 0000000000000000 100 0 0 10 0
   3: 0A00000F:0016 0A000001:D2F0 01 00000000:00000000 02:000A7F3C 00000000     0        0 18002 4 0000000000000000 20 4 30 10 -1
",
        );
        fs.add_file(
            "/proc/net/tcp6",
            "\
  sl  local_address                         remote_address                        st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000000000000000000000000000:0050 00000000000000000000000000000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 21003 1 0000000000000000 100 0 0 10 0
",
        );
        fs.add_file(
            "/proc/net/udp",
            "\
  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode ref pointer drops
  100: 3500007F:0035 00000000:0000 07 00000000:00000000 00:00000000 00000000   101        0 15001 2 0000000000000000 0
",
        );

        fs.add_process_sockets(640, &[18001, 18002]);
        fs.add_process_sockets(812, &[21001, 21002, 21003]);
        fs.add_dir("/proc/1/fd");

        fs.add_file(
            "/etc/passwd",
            "\
root:x:0:0:root:/root:/bin/bash
www-data:x:33:33:www-data:/var/www:/usr/sbin/nologin
deploy:x:1000:1000:Deploy:/home/deploy:/bin/bash
",
        );

        fs.add_file(
            format!("{}/default", NGINX_DIR),
            "\
server {
    listen 80 default_server;
    listen [::]:80 default_server;
    root /var/www/html;
}
",
        );
        fs.add_file(
            format!("{}/shop.example.com", NGINX_DIR),
            "\
server {
    listen 443 ssl;
    server_name shop.example.com;
    location / {
        proxy_pass http://127.0.0.1:8080;
    }
}
",
        );

        fs
    }
}

impl MockRunner {
    /// docker and lastlog answers matching [`MockFs::typical_host`].
    pub fn typical_host() -> Self {
        let mut runner = Self::new();
        runner
            .on(
                DOCKER,
                &PS_ARGS,
                r#"{"Image":"shop/api:1.4","Names":"shop-api","State":"running","Status":"Up 5 days"}
{"Image":"postgres:16","Names":"shop-db","State":"exited","Status":"Exited (0) 2 hours ago"}
"#,
            )
            .on(
                DOCKER,
                &IMAGES_ARGS,
                r#"{"ID":"sha256:aaa","Repository":"shop/api","Tag":"1.4"}
{"ID":"sha256:bbb","Repository":"postgres","Tag":"16"}
"#,
            )
            .on(
                DOCKER,
                &["inspect", "--type", "container", "shop-api"],
                r#"[{"Name":"/shop-api","State":{"Status":"running"},"Config":{"Image":"shop/api:1.4","Cmd":["./api","--port","8080"]},"NetworkSettings":{"Ports":{"8080/tcp":[{"HostIp":"127.0.0.1","HostPort":"8080"}]}}}]"#,
            )
            .on(
                LASTLOG,
                &["-u", "root"],
                "Username         Port     From             Latest\nroot             tty1                      Sat Feb  7 09:12:44 +0000 2026\n",
            )
            .on(
                LASTLOG,
                &["-u", "www-data"],
                "Username         Port     From             Latest\nwww-data                                   **Never logged in**\n",
            )
            .on(
                LASTLOG,
                &["-u", "deploy"],
                "Username         Port     From             Latest\ndeploy           pts/0    10.0.0.1         Sat Feb  7 16:58:02 +0000 2026\n",
            );
        runner
    }
}

/// Aggregator with all four collectors wired to the typical host.
pub fn typical_host_aggregator() -> Aggregator {
    let fs = MockFs::typical_host();
    let runner = Arc::new(MockRunner::typical_host());
    Aggregator::new()
        .with_collector(PortCollector::new(fs.clone(), "/proc"))
        .with_collector(DockerCollector::new(runner.clone()))
        .with_collector(NginxCollector::new(fs.clone(), NGINX_DIR))
        .with_collector(UserCollector::new(fs, "/etc/passwd", runner))
}
